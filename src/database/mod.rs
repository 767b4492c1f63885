// Copyright 2023 Remi Bernotavicius

use diesel::prelude::Connection as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use crate::records::FieldError;
use models::{Cell, Collection, RowPosition};
use std::fmt;
use std::path::Path;

pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Debug)]
pub enum StoreError {
    Connection(String),
    Permission(String),
    Migration(String),
    NoSuchRow {
        collection: Collection,
        position: RowPosition,
    },
    NoSuchRecord {
        collection: Collection,
        key: String,
    },
    DuplicateKey {
        collection: Collection,
        key: String,
    },
    MissingColumn {
        collection: Collection,
        column: &'static str,
    },
    /// A record that would not read back if it were written.
    Invalid(FieldError),
    Query(diesel::result::Error),
}

impl StoreError {
    /// Fatal errors mean the workbook can't be used for the rest of the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Permission(_) | Self::Migration(_)
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "couldn't connect to workbook: {e}"),
            Self::Permission(e) => write!(f, "not allowed to modify workbook: {e}"),
            Self::Migration(e) => write!(f, "couldn't prepare workbook: {e}"),
            Self::NoSuchRow {
                collection,
                position,
            } => write!(f, "{collection} has no row {position}"),
            Self::NoSuchRecord { collection, key } => {
                write!(f, "{collection} has no entry for {key:?}")
            }
            Self::DuplicateKey { collection, key } => {
                write!(f, "{collection} already has an entry for {key:?}")
            }
            Self::MissingColumn { collection, column } => {
                write!(f, "{collection} header is missing column {column:?}")
            }
            Self::Invalid(e) => write!(f, "refusing to write {e}"),
            Self::Query(e) => write!(f, "workbook query failed: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        if let diesel::result::Error::DatabaseError(_, info) = &e {
            if info.message().contains("readonly") {
                return Self::Permission(info.message().into());
            }
        }
        Self::Query(e)
    }
}

impl From<FieldError> for StoreError {
    fn from(e: FieldError) -> Self {
        Self::Invalid(e)
    }
}

impl From<diesel::ConnectionError> for StoreError {
    fn from(e: diesel::ConnectionError) -> Self {
        Self::Connection(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

fn last_position(conn: &mut Connection, collection: Collection) -> Result<i32> {
    use schema::cells::dsl;

    let last: Option<i32> = dsl::cells
        .filter(dsl::sheet.eq(collection))
        .select(diesel::dsl::max(dsl::position))
        .get_result(conn)?;
    Ok(last.unwrap_or(0))
}

fn check_row_exists(
    conn: &mut Connection,
    collection: Collection,
    position: RowPosition,
) -> Result<()> {
    if position < RowPosition::HEADER || position.get() > last_position(conn, collection)? {
        return Err(StoreError::NoSuchRow {
            collection,
            position,
        });
    }
    Ok(())
}

fn delete_cells(conn: &mut Connection, collection: Collection, row: RowPosition) -> Result<()> {
    use schema::cells::dsl;

    diesel::delete(
        dsl::cells
            .filter(dsl::sheet.eq(collection))
            .filter(dsl::position.eq(row)),
    )
    .execute(conn)?;
    Ok(())
}

fn insert_cells(
    conn: &mut Connection,
    collection: Collection,
    row: RowPosition,
    values: &[String],
) -> Result<()> {
    use schema::cells::dsl;

    let mut new_cells: Vec<Cell> = values
        .iter()
        .enumerate()
        .map(|(column, value)| Cell {
            sheet: collection,
            position: row,
            column_index: column as i32,
            value: value.clone(),
        })
        .collect();

    // A row with no cells at all would be indistinguishable from the end of the sheet.
    if new_cells.is_empty() {
        new_cells.push(Cell {
            sheet: collection,
            position: row,
            column_index: 0,
            value: String::new(),
        });
    }

    diesel::insert_into(dsl::cells)
        .values(&new_cells)
        .execute(conn)?;
    Ok(())
}

fn into_rows(cells: Vec<Cell>) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = vec![];
    for cell in cells {
        let row_index = (cell.position.get() - 1) as usize;
        if rows.len() <= row_index {
            rows.resize_with(row_index + 1, Vec::new);
        }
        let row = &mut rows[row_index];
        let column = cell.column_index as usize;
        if row.len() <= column {
            row.resize(column + 1, String::new());
        }
        row[column] = cell.value;
    }
    rows
}

/// Handle to the workbook holding every collection. There is one per session; it is opened at
/// startup and passed to whatever needs to read or write rows.
pub struct Workbook {
    conn: Connection,
}

impl Workbook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let url = path
            .to_str()
            .ok_or_else(|| StoreError::Connection(format!("path {path:?} is not valid UTF-8")))?;
        let mut conn = Connection::establish(url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        log::info!("opened workbook {}", path.display());
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn close(self) {
        log::info!("closed workbook");
        drop(self.conn);
    }

    /// Every row of the sheet, header included. Rows are padded so that the row at position `n`
    /// is at index `n - 1`.
    pub fn get_all_values(&mut self, collection: Collection) -> Result<Vec<Vec<String>>> {
        use schema::cells::dsl;

        let loaded: Vec<Cell> = dsl::cells
            .filter(dsl::sheet.eq(collection))
            .order_by((dsl::position.asc(), dsl::column_index.asc()))
            .select(Cell::as_select())
            .load(&mut self.conn)?;
        Ok(into_rows(loaded))
    }

    pub fn read_row(
        &mut self,
        collection: Collection,
        position: RowPosition,
    ) -> Result<Option<Vec<String>>> {
        use schema::cells::dsl;

        let loaded: Vec<Cell> = dsl::cells
            .filter(dsl::sheet.eq(collection))
            .filter(dsl::position.eq(position))
            .order_by(dsl::column_index.asc())
            .select(Cell::as_select())
            .load(&mut self.conn)?;
        if loaded.is_empty() {
            return Ok(None);
        }

        let mut row = vec![];
        for cell in loaded {
            let column = cell.column_index as usize;
            if row.len() <= column {
                row.resize(column + 1, String::new());
            }
            row[column] = cell.value;
        }
        Ok(Some(row))
    }

    /// Number of rows in the sheet, header included.
    pub fn row_count(&mut self, collection: Collection) -> Result<usize> {
        Ok(last_position(&mut self.conn, collection)? as usize)
    }

    pub fn append_row(&mut self, collection: Collection, values: &[String]) -> Result<RowPosition> {
        let position = self.conn.transaction::<_, StoreError, _>(|conn| {
            let position = RowPosition::new(last_position(conn, collection)? + 1);
            insert_cells(conn, collection, position, values)?;
            Ok(position)
        })?;
        log::debug!("appended row {position} to {collection}");
        Ok(position)
    }

    pub fn update_row(
        &mut self,
        collection: Collection,
        position: RowPosition,
        values: &[String],
    ) -> Result<()> {
        self.conn.transaction::<_, StoreError, _>(|conn| {
            check_row_exists(conn, collection, position)?;
            delete_cells(conn, collection, position)?;
            insert_cells(conn, collection, position, values)
        })?;
        log::debug!("updated row {position} of {collection}");
        Ok(())
    }

    /// Removes the row. Every row below it moves up by one.
    pub fn delete_row(&mut self, collection: Collection, position: RowPosition) -> Result<()> {
        use schema::cells::dsl;

        self.conn.transaction::<_, StoreError, _>(|conn| {
            check_row_exists(conn, collection, position)?;
            delete_cells(conn, collection, position)?;
            diesel::update(
                dsl::cells
                    .filter(dsl::sheet.eq(collection))
                    .filter(dsl::position.gt(position)),
            )
            .set(dsl::position.eq(dsl::position - 1))
            .execute(conn)?;
            Ok(())
        })?;
        log::debug!("deleted row {position} of {collection}");
        Ok(())
    }
}

#[cfg(test)]
fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn migrations() {
    let mut conn = Connection::establish(":memory:").unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();
    conn.revert_all_migrations(MIGRATIONS).unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();
}

#[test]
fn append_and_read_back() {
    let mut book = Workbook::open_in_memory().unwrap();
    let header = book
        .append_row(Collection::Recipes, &strings(&["a", "b"]))
        .unwrap();
    let first = book
        .append_row(Collection::Recipes, &strings(&["1", "", "3"]))
        .unwrap();
    book.append_row(Collection::Ingredients, &strings(&["other"]))
        .unwrap();

    assert_eq!(header, RowPosition::HEADER);
    assert_eq!(first, RowPosition::FIRST_DATA);
    assert_eq!(
        book.get_all_values(Collection::Recipes).unwrap(),
        vec![strings(&["a", "b"]), strings(&["1", "", "3"])]
    );
    assert_eq!(book.row_count(Collection::Ingredients).unwrap(), 1);
    assert_eq!(book.row_count(Collection::MealPlan).unwrap(), 0);
    assert_eq!(
        book.read_row(Collection::Recipes, RowPosition::new(2))
            .unwrap(),
        Some(strings(&["1", "", "3"]))
    );
    assert_eq!(
        book.read_row(Collection::Recipes, RowPosition::new(3))
            .unwrap(),
        None
    );
}

#[test]
fn delete_row_shifts_rows_below() {
    let mut book = Workbook::open_in_memory().unwrap();
    for v in ["header", "one", "two", "three"] {
        book.append_row(Collection::MealPlan, &strings(&[v])).unwrap();
    }

    book.delete_row(Collection::MealPlan, RowPosition::new(2))
        .unwrap();

    assert_eq!(
        book.get_all_values(Collection::MealPlan).unwrap(),
        vec![strings(&["header"]), strings(&["two"]), strings(&["three"])]
    );
    let next = book
        .append_row(Collection::MealPlan, &strings(&["four"]))
        .unwrap();
    assert_eq!(next, RowPosition::new(4));
}

#[test]
fn update_row_replaces_every_cell() {
    let mut book = Workbook::open_in_memory().unwrap();
    book.append_row(Collection::Ingredients, &strings(&["h"]))
        .unwrap();
    book.append_row(Collection::Ingredients, &strings(&["x", "y", "z"]))
        .unwrap();

    book.update_row(
        Collection::Ingredients,
        RowPosition::new(2),
        &strings(&["w"]),
    )
    .unwrap();

    assert_eq!(
        book.get_all_values(Collection::Ingredients).unwrap(),
        vec![strings(&["h"]), strings(&["w"])]
    );
}

#[test]
fn missing_rows_are_reported() {
    let mut book = Workbook::open_in_memory().unwrap();
    book.append_row(Collection::Recipes, &strings(&["h"]))
        .unwrap();

    let err = book
        .update_row(Collection::Recipes, RowPosition::new(5), &strings(&["x"]))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::NoSuchRow {
            collection: Collection::Recipes,
            ..
        }
    ));
    assert!(!err.is_fatal());

    let err = book
        .delete_row(Collection::Recipes, RowPosition::new(2))
        .unwrap_err();
    assert!(matches!(err, StoreError::NoSuchRow { .. }));
}

#[test]
fn unreachable_workbook_is_fatal() {
    let err = Workbook::open("/nonexistent-directory/for/sure/workbook.sqlite")
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::Connection(_)));
    assert!(err.is_fatal());
}
