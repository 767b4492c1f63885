// Copyright 2023 Remi Bernotavicius

use crate::database::models::{Collection, RowPosition};
use crate::database::{Result, StoreError, Workbook};
use crate::nutrition::{self, Aggregate, Nutrients, SkipReason};
use crate::records::{
    FieldError, Fields, Header, Ingredient, MealKey, MealPlanEntry, Recipe, RecipeIngredient,
    Record, DATE_FORMAT, INGREDIENT_NAME, RECIPE_NAME,
};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Positioned<R> {
    pub position: RowPosition,
    pub record: R,
}

/// A row that is present but couldn't be turned into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Malformed {
    pub collection: Collection,
    pub position: RowPosition,
    /// Contents of the record's key column, possibly empty.
    pub key: String,
    pub error: FieldError,
}

impl Malformed {
    fn skip_in(&self, aggregate: &mut Aggregate) {
        aggregate.skip(
            format!("{} entry {:?}", self.collection, self.key),
            SkipReason::Malformed {
                position: self.position,
                error: self.error.clone(),
            },
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing<R> {
    pub records: Vec<Positioned<R>>,
    pub malformed: Vec<Malformed>,
}

impl<R> Default for Listing<R> {
    fn default() -> Self {
        Self {
            records: vec![],
            malformed: vec![],
        }
    }
}

impl<R> Listing<R> {
    pub fn into_records(self) -> Vec<R> {
        self.records.into_iter().map(|p| p.record).collect()
    }

    fn retain(self, key: &str, keep: impl Fn(&R) -> bool) -> Self {
        Self {
            records: self
                .records
                .into_iter()
                .filter(|p| keep(&p.record))
                .collect(),
            malformed: self
                .malformed
                .into_iter()
                .filter(|m| m.key == key)
                .collect(),
        }
    }
}

/// Opens the workbook and makes sure every collection has its header row.
pub fn open_workbook(path: impl AsRef<Path>) -> Result<Workbook> {
    let mut book = Workbook::open(path)?;
    initialize(&mut book)?;
    Ok(book)
}

pub fn initialize(book: &mut Workbook) -> Result<()> {
    ensure_header::<Recipe>(book)?;
    ensure_header::<Ingredient>(book)?;
    ensure_header::<RecipeIngredient>(book)?;
    ensure_header::<MealPlanEntry>(book)?;
    Ok(())
}

fn ensure_header<R: Record>(book: &mut Workbook) -> Result<()> {
    match book.read_row(R::COLLECTION, RowPosition::HEADER)? {
        Some(cells) => Header::new(cells).check(R::COLLECTION, R::COLUMNS),
        None => {
            let columns: Vec<String> = R::COLUMNS.iter().map(|c| c.to_string()).collect();
            book.append_row(R::COLLECTION, &columns)?;
            log::info!("wrote header row for {}", R::COLLECTION);
            Ok(())
        }
    }
}

fn header<R: Record>(book: &mut Workbook) -> Result<Header> {
    let header = Header::new(
        book.read_row(R::COLLECTION, RowPosition::HEADER)?
            .unwrap_or_default(),
    );
    header.check(R::COLLECTION, R::COLUMNS)?;
    Ok(header)
}

pub fn list_all<R: Record>(book: &mut Workbook) -> Result<Listing<R>> {
    let mut rows = book.get_all_values(R::COLLECTION)?.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Listing::default());
    };
    let header = Header::new(header);

    let mut listing = Listing::default();
    for (index, cells) in rows.enumerate() {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let position = RowPosition::for_index(index);
        let fields = Fields::new(&header, &cells);
        match R::from_fields(&fields) {
            Ok(record) => listing.records.push(Positioned { position, record }),
            Err(error) => {
                log::warn!("{} row {position}: {error}", R::COLLECTION);
                listing.malformed.push(Malformed {
                    collection: R::COLLECTION,
                    position,
                    key: fields.text(R::KEY_COLUMN).trim().into(),
                    error,
                });
            }
        }
    }
    Ok(listing)
}

pub fn append<R: Record>(book: &mut Workbook, record: &R) -> Result<RowPosition> {
    let row = header::<R>(book)?.arrange(R::COLLECTION, record.to_fields())?;
    book.append_row(R::COLLECTION, &row)
}

pub fn replace_at<R: Record>(book: &mut Workbook, position: RowPosition, record: &R) -> Result<()> {
    if !position.is_data() {
        return Err(StoreError::NoSuchRow {
            collection: R::COLLECTION,
            position,
        });
    }
    let row = header::<R>(book)?.arrange(R::COLLECTION, record.to_fields())?;
    book.update_row(R::COLLECTION, position, &row)
}

pub fn delete_at(book: &mut Workbook, collection: Collection, position: RowPosition) -> Result<()> {
    if !position.is_data() {
        return Err(StoreError::NoSuchRow {
            collection,
            position,
        });
    }
    book.delete_row(collection, position)
}

/// Positions of the data rows whose `key_column` cell holds `key_value`, along with that column's
/// index and the rows themselves.
fn rows_keyed_by(
    book: &mut Workbook,
    collection: Collection,
    key_column: &'static str,
    key_value: &str,
) -> Result<(usize, Vec<(RowPosition, Vec<String>)>)> {
    let mut rows = book.get_all_values(collection)?.into_iter();
    let Some(header) = rows.next() else {
        return Ok((0, vec![]));
    };
    let column = Header::new(header)
        .index_of(key_column)
        .ok_or(StoreError::MissingColumn {
            collection,
            column: key_column,
        })?;

    let matching = rows
        .enumerate()
        .filter(|(_, cells)| cells.get(column).is_some_and(|c| c.trim() == key_value))
        .map(|(index, cells)| (RowPosition::for_index(index), cells))
        .collect();
    Ok((column, matching))
}

/// Deletes every row whose `key_column` holds `key_value`, returning how many went away.
pub fn clear_by_key(
    book: &mut Workbook,
    collection: Collection,
    key_column: &'static str,
    key_value: &str,
) -> Result<usize> {
    let (_, matching) = rows_keyed_by(book, collection, key_column, key_value)?;

    // Bottom-up, so earlier deletions don't move the rows still to be deleted.
    for (position, _) in matching.iter().rev() {
        book.delete_row(collection, *position)?;
    }
    Ok(matching.len())
}

/// Rewrites the `key_column` cell of every row holding `old_value`, whether or not the rest of
/// the row parses.
fn rename_key(
    book: &mut Workbook,
    collection: Collection,
    key_column: &'static str,
    old_value: &str,
    new_value: &str,
) -> Result<usize> {
    let (column, matching) = rows_keyed_by(book, collection, key_column, old_value)?;
    let count = matching.len();
    for (position, mut cells) in matching {
        cells[column] = new_value.into();
        book.update_row(collection, position, &cells)?;
    }
    Ok(count)
}

fn find<R: Record>(
    book: &mut Workbook,
    key: &str,
    matches: impl Fn(&R) -> bool,
) -> Result<Positioned<R>> {
    list_all::<R>(book)?
        .records
        .into_iter()
        .find(|p| matches(&p.record))
        .ok_or_else(|| StoreError::NoSuchRecord {
            collection: R::COLLECTION,
            key: key.into(),
        })
}

fn check_unique<R: Record>(
    book: &mut Workbook,
    key: &str,
    matches: impl Fn(&R) -> bool,
) -> Result<()> {
    if list_all::<R>(book)?
        .records
        .iter()
        .any(|p| matches(&p.record))
    {
        return Err(StoreError::DuplicateKey {
            collection: R::COLLECTION,
            key: key.into(),
        });
    }
    Ok(())
}

pub fn get_recipe(book: &mut Workbook, name: &str) -> Result<Recipe> {
    Ok(find::<Recipe>(book, name, |r| r.name == name)?.record)
}

pub fn add_recipe(book: &mut Workbook, recipe: &Recipe) -> Result<RowPosition> {
    check_unique::<Recipe>(book, &recipe.name, |r| r.name == recipe.name)?;
    append(book, recipe)
}

/// Replaces a recipe's details. The stored totals are kept, since they only change when the
/// ingredients are saved. Renaming carries over to the recipe's ingredients and meals.
pub fn edit_recipe(book: &mut Workbook, old_name: &str, edited: Recipe) -> Result<()> {
    let existing = find::<Recipe>(book, old_name, |r| r.name == old_name)?;
    if edited.name != old_name {
        check_unique::<Recipe>(book, &edited.name, |r| r.name == edited.name)?;
    }

    let edited = Recipe {
        totals: existing.record.totals,
        ..edited
    };
    replace_at(book, existing.position, &edited)?;

    if edited.name != old_name {
        let usages = rename_key(
            book,
            Collection::RecipeIngredients,
            RECIPE_NAME,
            old_name,
            &edited.name,
        )?;
        let meals = rename_key(book, Collection::MealPlan, RECIPE_NAME, old_name, &edited.name)?;
        log::info!("renamed recipe {old_name:?} in {usages} ingredient rows and {meals} meals");
    }
    Ok(())
}

/// Deletes the recipe and its ingredient list. Meals referring to it are left in place.
pub fn delete_recipe(book: &mut Workbook, name: &str) -> Result<()> {
    let existing = find::<Recipe>(book, name, |r| r.name == name)?;
    delete_at(book, Collection::Recipes, existing.position)?;
    let cleared = clear_by_key(book, Collection::RecipeIngredients, RECIPE_NAME, name)?;
    log::info!("deleted recipe {name:?} and {cleared} of its ingredients");
    Ok(())
}

pub fn add_ingredient(book: &mut Workbook, ingredient: &Ingredient) -> Result<RowPosition> {
    check_unique::<Ingredient>(book, &ingredient.name, |i| i.name == ingredient.name)?;
    append(book, ingredient)
}

/// Replaces an ingredient. Recipe totals aren't recomputed until their ingredients are saved
/// again. Renaming carries over to every recipe using it.
pub fn edit_ingredient(book: &mut Workbook, old_name: &str, edited: &Ingredient) -> Result<()> {
    let existing = find::<Ingredient>(book, old_name, |i| i.name == old_name)?;
    if edited.name != old_name {
        check_unique::<Ingredient>(book, &edited.name, |i| i.name == edited.name)?;
    }
    replace_at(book, existing.position, edited)?;

    if edited.name != old_name {
        rename_key(
            book,
            Collection::RecipeIngredients,
            INGREDIENT_NAME,
            old_name,
            &edited.name,
        )?;
    }
    Ok(())
}

pub fn delete_ingredient(book: &mut Workbook, name: &str) -> Result<()> {
    let existing = find::<Ingredient>(book, name, |i| i.name == name)?;
    delete_at(book, Collection::Ingredients, existing.position)
}

pub fn recipe_ingredients(book: &mut Workbook, recipe: &str) -> Result<Listing<RecipeIngredient>> {
    Ok(list_all::<RecipeIngredient>(book)?.retain(recipe, |u| u.recipe == recipe))
}

/// Replaces the recipe's whole ingredient list, then recomputes and stores its totals.
pub fn save_recipe_ingredients(
    book: &mut Workbook,
    recipe: &str,
    usages: &[RecipeIngredient],
) -> Result<Aggregate> {
    find::<Recipe>(book, recipe, |r| r.name == recipe)?;

    clear_by_key(book, Collection::RecipeIngredients, RECIPE_NAME, recipe)?;
    for usage in usages {
        let usage = RecipeIngredient {
            recipe: recipe.into(),
            ..usage.clone()
        };
        append(book, &usage)?;
    }

    recompute_recipe(book, recipe)
}

pub fn recompute_recipe(book: &mut Workbook, recipe: &str) -> Result<Aggregate> {
    let existing = find::<Recipe>(book, recipe, |r| r.name == recipe)?;

    let facts: HashMap<String, Nutrients> = list_all::<Ingredient>(book)?
        .into_records()
        .into_iter()
        .map(|i| (i.name, i.per_100))
        .collect();
    let Listing { records, malformed } = recipe_ingredients(book, recipe)?;
    let usages: Vec<RecipeIngredient> = records.into_iter().map(|p| p.record).collect();

    let mut aggregate = nutrition::compute_recipe_totals(&facts, &usages);
    for m in &malformed {
        m.skip_in(&mut aggregate);
    }

    // Totals that overflow wouldn't parse back, which would hide the recipe.
    let updated = existing.record.with_totals(aggregate.totals)?;
    replace_at(book, existing.position, &updated)?;
    log::info!(
        "{recipe:?} now has {} calories from {} ingredients",
        aggregate.totals.calories,
        aggregate.counted
    );
    Ok(aggregate)
}

pub fn meals_on(book: &mut Workbook, date: chrono::NaiveDate) -> Result<Listing<MealPlanEntry>> {
    let key = date.format(DATE_FORMAT).to_string();
    Ok(list_all::<MealPlanEntry>(book)?.retain(&key, |m| m.date == date))
}

pub fn add_meal(book: &mut Workbook, entry: &MealPlanEntry) -> Result<RowPosition> {
    let key = entry.key();
    check_unique::<MealPlanEntry>(book, &key.to_string(), |m| m.key() == key)?;
    append(book, entry)
}

pub fn replace_meal(book: &mut Workbook, key: &MealKey, entry: &MealPlanEntry) -> Result<()> {
    let existing = find::<MealPlanEntry>(book, &key.to_string(), |m| m.key() == *key)?;
    let new_key = entry.key();
    if new_key != *key {
        check_unique::<MealPlanEntry>(book, &new_key.to_string(), |m| m.key() == new_key)?;
    }
    replace_at(book, existing.position, entry)
}

pub fn delete_meal(book: &mut Workbook, key: &MealKey) -> Result<()> {
    let existing = find::<MealPlanEntry>(book, &key.to_string(), |m| m.key() == *key)?;
    delete_at(book, Collection::MealPlan, existing.position)
}

pub fn daily_totals(book: &mut Workbook, date: chrono::NaiveDate) -> Result<Aggregate> {
    let Listing { records, malformed } = meals_on(book, date)?;
    let meals: Vec<MealPlanEntry> = records.into_iter().map(|p| p.record).collect();
    let recipes: HashMap<String, Recipe> = list_all::<Recipe>(book)?
        .into_records()
        .into_iter()
        .map(|r| (r.name.clone(), r))
        .collect();

    let mut aggregate = nutrition::compute_daily_totals(&meals, &recipes);
    for m in &malformed {
        m.skip_in(&mut aggregate);
    }
    Ok(aggregate)
}

#[cfg(test)]
use crate::records::{FieldProblem, MealType, PORTION_SIZE};

#[cfg(test)]
fn test_book() -> Workbook {
    let mut book = Workbook::open_in_memory().unwrap();
    initialize(&mut book).unwrap();
    book
}

#[cfg(test)]
fn day(d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

#[cfg(test)]
fn facts(calories: f64, protein: f64, carbs: f64, fat: f64) -> Nutrients {
    Nutrients {
        calories,
        protein,
        carbs,
        fat,
    }
}

#[cfg(test)]
fn sorted_triples(usages: Vec<RecipeIngredient>) -> Vec<(String, f64, String)> {
    let mut triples: Vec<_> = usages
        .into_iter()
        .map(|u| (u.ingredient, u.quantity, u.unit))
        .collect();
    triples.sort_by(|a, b| a.0.cmp(&b.0));
    triples
}

#[cfg(test)]
fn stocked_book() -> Workbook {
    let mut book = test_book();
    for ingredient in [
        Ingredient::new("oats", facts(200.0, 10.0, 60.0, 5.0), "grams").unwrap(),
        Ingredient::new("milk", facts(50.0, 3.0, 5.0, 2.0), "ml").unwrap(),
    ] {
        add_ingredient(&mut book, &ingredient).unwrap();
    }
    add_recipe(
        &mut book,
        &Recipe::new("porridge", "stir", "", 2.0).unwrap(),
    )
    .unwrap();
    book
}

#[test]
fn initialize_writes_headers_once() {
    let mut book = test_book();
    initialize(&mut book).unwrap();

    for collection in Collection::iter() {
        assert_eq!(book.row_count(collection).unwrap(), 1);
    }
    assert_eq!(
        book.read_row(Collection::MealPlan, RowPosition::HEADER)
            .unwrap()
            .unwrap(),
        MealPlanEntry::COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
    );
}

#[test]
fn initialize_rejects_incomplete_headers() {
    let mut book = Workbook::open_in_memory().unwrap();
    book.append_row(Collection::Recipes, &[RECIPE_NAME.to_string()])
        .unwrap();
    assert!(matches!(
        initialize(&mut book),
        Err(StoreError::MissingColumn {
            collection: Collection::Recipes,
            ..
        })
    ));
}

#[test]
fn records_keep_their_positions() {
    let mut book = test_book();
    let first = Ingredient::new("salt", Nutrients::ZERO, "grams").unwrap();
    let second = Ingredient::new("sugar", facts(387.0, 0.0, 100.0, 0.0), "grams").unwrap();
    assert_eq!(append(&mut book, &first).unwrap(), RowPosition::new(2));
    assert_eq!(append(&mut book, &second).unwrap(), RowPosition::new(3));

    let listing = list_all::<Ingredient>(&mut book).unwrap();
    assert_eq!(
        listing.records,
        vec![
            Positioned {
                position: RowPosition::new(2),
                record: first.clone(),
            },
            Positioned {
                position: RowPosition::new(3),
                record: second.clone(),
            },
        ]
    );

    let edited = Ingredient::new("sea salt", Nutrients::ZERO, "grams").unwrap();
    replace_at(&mut book, RowPosition::new(2), &edited).unwrap();
    delete_at(&mut book, Collection::Ingredients, RowPosition::new(3)).unwrap();
    assert_eq!(
        list_all::<Ingredient>(&mut book).unwrap().into_records(),
        vec![edited]
    );
}

#[test]
fn header_row_is_not_addressable() {
    let mut book = test_book();
    let salt = Ingredient::new("salt", Nutrients::ZERO, "grams").unwrap();
    assert!(matches!(
        replace_at(&mut book, RowPosition::HEADER, &salt),
        Err(StoreError::NoSuchRow { .. })
    ));
    assert!(matches!(
        delete_at(&mut book, Collection::Ingredients, RowPosition::HEADER),
        Err(StoreError::NoSuchRow { .. })
    ));
}

#[test]
fn columns_are_read_in_sheet_order() {
    let mut book = Workbook::open_in_memory().unwrap();
    let reordered: Vec<String> = RecipeIngredient::COLUMNS
        .iter()
        .rev()
        .map(|c| c.to_string())
        .collect();
    book.append_row(Collection::RecipeIngredients, &reordered)
        .unwrap();
    initialize(&mut book).unwrap();

    let usage = RecipeIngredient::new("bread", "flour", 500.0, "grams").unwrap();
    append(&mut book, &usage).unwrap();

    assert_eq!(
        book.read_row(Collection::RecipeIngredients, RowPosition::new(2))
            .unwrap()
            .unwrap(),
        vec!["grams", "500", "flour", "bread"]
    );
    assert_eq!(
        list_all::<RecipeIngredient>(&mut book)
            .unwrap()
            .into_records(),
        vec![usage]
    );
}

#[test]
fn clear_by_key_removes_only_matching_rows() {
    let mut book = test_book();
    for (recipe, ingredient) in [
        ("bread", "flour"),
        ("cake", "flour"),
        ("bread", "water"),
        ("bread", "salt"),
        ("cake", "sugar"),
    ] {
        append(
            &mut book,
            &RecipeIngredient::new(recipe, ingredient, 1.0, "grams").unwrap(),
        )
        .unwrap();
    }

    let cleared = clear_by_key(&mut book, Collection::RecipeIngredients, RECIPE_NAME, "bread")
        .unwrap();
    assert_eq!(cleared, 3);

    let left: Vec<_> = list_all::<RecipeIngredient>(&mut book)
        .unwrap()
        .into_records()
        .into_iter()
        .map(|u| (u.recipe, u.ingredient))
        .collect();
    assert_eq!(
        left,
        vec![
            ("cake".to_string(), "flour".to_string()),
            ("cake".to_string(), "sugar".to_string()),
        ]
    );

    assert_eq!(
        clear_by_key(&mut book, Collection::RecipeIngredients, RECIPE_NAME, "bread").unwrap(),
        0
    );
    assert!(matches!(
        clear_by_key(&mut book, Collection::RecipeIngredients, "Chef", "bread"),
        Err(StoreError::MissingColumn { .. })
    ));
}

#[test]
fn saved_ingredients_reload_unchanged() {
    let mut book = stocked_book();
    let usages = vec![
        RecipeIngredient::new("porridge", "oats", 150.0, "grams").unwrap(),
        RecipeIngredient::new("porridge", "milk", 250.0, "ml").unwrap(),
    ];

    let aggregate = save_recipe_ingredients(&mut book, "porridge", &usages).unwrap();
    assert!(aggregate.skipped.is_empty());

    let reloaded = recipe_ingredients(&mut book, "porridge")
        .unwrap()
        .into_records();
    assert_eq!(sorted_triples(reloaded), sorted_triples(usages));

    let recipe = get_recipe(&mut book, "porridge").unwrap();
    assert_eq!(recipe.totals, facts(425.0, 22.5, 102.5, 12.5));
    assert_eq!(recipe.instructions, "stir");
}

#[test]
fn saving_replaces_the_previous_list() {
    let mut book = stocked_book();
    add_recipe(&mut book, &Recipe::new("muesli", "", "", 1.0).unwrap()).unwrap();
    save_recipe_ingredients(
        &mut book,
        "muesli",
        &[RecipeIngredient::new("muesli", "oats", 80.0, "grams").unwrap()],
    )
    .unwrap();
    save_recipe_ingredients(
        &mut book,
        "porridge",
        &[
            RecipeIngredient::new("porridge", "oats", 150.0, "grams").unwrap(),
            RecipeIngredient::new("porridge", "milk", 250.0, "ml").unwrap(),
        ],
    )
    .unwrap();

    let aggregate = save_recipe_ingredients(
        &mut book,
        "porridge",
        &[RecipeIngredient::new("porridge", "oats", 100.0, "grams").unwrap()],
    )
    .unwrap();

    assert_eq!(aggregate.totals, facts(200.0, 10.0, 60.0, 5.0));
    assert_eq!(
        recipe_ingredients(&mut book, "porridge")
            .unwrap()
            .records
            .len(),
        1
    );
    assert_eq!(
        recipe_ingredients(&mut book, "muesli")
            .unwrap()
            .into_records(),
        vec![RecipeIngredient::new("muesli", "oats", 80.0, "grams").unwrap()]
    );
}

#[test]
fn unknown_ingredients_are_reported_when_saving() {
    let mut book = stocked_book();
    let aggregate = save_recipe_ingredients(
        &mut book,
        "porridge",
        &[
            RecipeIngredient::new("porridge", "oats", 150.0, "grams").unwrap(),
            RecipeIngredient::new("porridge", "honey", 20.0, "grams").unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(aggregate.totals.calories, 300.0);
    assert_eq!(aggregate.skipped.len(), 1);
    assert_eq!(aggregate.skipped[0].item, "honey");
    assert_eq!(aggregate.skipped[0].reason, SkipReason::UnknownIngredient);
}

#[test]
fn saving_for_a_missing_recipe_fails() {
    let mut book = stocked_book();
    let err = save_recipe_ingredients(&mut book, "gruel", &[]).unwrap_err();
    assert!(matches!(
        err,
        StoreError::NoSuchRecord {
            collection: Collection::Recipes,
            ..
        }
    ));
    assert!(!err.is_fatal());
}

#[test]
fn daily_totals_scale_by_portion() {
    let mut book = test_book();
    add_recipe(
        &mut book,
        &Recipe::new("stew", "", "", 4.0)
            .unwrap()
            .with_totals(facts(400.0, 40.0, 20.0, 8.0))
            .unwrap(),
    )
    .unwrap();
    add_meal(
        &mut book,
        &MealPlanEntry::new(day(1), MealType::Dinner, "stew", 2.0).unwrap(),
    )
    .unwrap();
    add_meal(
        &mut book,
        &MealPlanEntry::new(day(2), MealType::Dinner, "stew", 1.0).unwrap(),
    )
    .unwrap();

    let aggregate = daily_totals(&mut book, day(1)).unwrap();
    assert_eq!(aggregate.totals, facts(200.0, 20.0, 10.0, 4.0));
    assert_eq!(aggregate.counted, 1);
}

#[test]
fn malformed_meals_are_skipped_not_fatal() {
    let mut book = test_book();
    add_recipe(
        &mut book,
        &Recipe::new("stew", "", "", 1.0)
            .unwrap()
            .with_totals(facts(400.0, 0.0, 0.0, 0.0))
            .unwrap(),
    )
    .unwrap();
    add_meal(
        &mut book,
        &MealPlanEntry::new(day(1), MealType::Lunch, "stew", 1.0).unwrap(),
    )
    .unwrap();
    let bad_row: Vec<String> = ["2024-05-01", "Dinner", "stew", "a lot"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    book.append_row(Collection::MealPlan, &bad_row).unwrap();

    let meals = meals_on(&mut book, day(1)).unwrap();
    assert_eq!(meals.records.len(), 1);
    assert_eq!(meals.malformed.len(), 1);
    assert_eq!(meals.malformed[0].error.column, PORTION_SIZE);
    assert_eq!(meals.malformed[0].error.problem, FieldProblem::NotANumber);

    let aggregate = daily_totals(&mut book, day(1)).unwrap();
    assert_eq!(aggregate.totals.calories, 400.0);
    assert_eq!(aggregate.skipped.len(), 1);
    assert!(matches!(
        aggregate.skipped[0].reason,
        SkipReason::Malformed { position, .. } if position == RowPosition::new(3)
    ));

    assert!(daily_totals(&mut book, day(2))
        .unwrap()
        .skipped
        .is_empty());
}

#[test]
fn deleting_a_recipe_clears_its_ingredients() {
    let mut book = stocked_book();
    save_recipe_ingredients(
        &mut book,
        "porridge",
        &[RecipeIngredient::new("porridge", "oats", 150.0, "grams").unwrap()],
    )
    .unwrap();
    add_meal(
        &mut book,
        &MealPlanEntry::new(day(3), MealType::Breakfast, "porridge", 1.0).unwrap(),
    )
    .unwrap();

    delete_recipe(&mut book, "porridge").unwrap();

    assert!(list_all::<Recipe>(&mut book).unwrap().records.is_empty());
    assert!(list_all::<RecipeIngredient>(&mut book)
        .unwrap()
        .records
        .is_empty());
    let aggregate = daily_totals(&mut book, day(3)).unwrap();
    assert_eq!(aggregate.totals, Nutrients::ZERO);
    assert_eq!(aggregate.skipped[0].reason, SkipReason::UnknownRecipe);

    assert!(matches!(
        delete_recipe(&mut book, "porridge"),
        Err(StoreError::NoSuchRecord { .. })
    ));
}

#[test]
fn names_stay_unique() {
    let mut book = stocked_book();
    assert!(matches!(
        add_recipe(&mut book, &Recipe::new("porridge", "", "", 1.0).unwrap()),
        Err(StoreError::DuplicateKey { .. })
    ));
    assert!(matches!(
        add_ingredient(
            &mut book,
            &Ingredient::new("milk", Nutrients::ZERO, "ml").unwrap()
        ),
        Err(StoreError::DuplicateKey { .. })
    ));
    let meal = MealPlanEntry::new(day(1), MealType::Snack, "porridge", 1.0).unwrap();
    add_meal(&mut book, &meal).unwrap();
    assert!(matches!(
        add_meal(&mut book, &meal),
        Err(StoreError::DuplicateKey { .. })
    ));
}

#[test]
fn renaming_a_recipe_keeps_totals_and_references() {
    let mut book = stocked_book();
    save_recipe_ingredients(
        &mut book,
        "porridge",
        &[RecipeIngredient::new("porridge", "oats", 150.0, "grams").unwrap()],
    )
    .unwrap();
    add_meal(
        &mut book,
        &MealPlanEntry::new(day(4), MealType::Breakfast, "porridge", 2.0).unwrap(),
    )
    .unwrap();

    let renamed = Recipe::new("oatmeal", "stir slowly", "good", 2.0).unwrap();
    edit_recipe(&mut book, "porridge", renamed).unwrap();

    let recipe = get_recipe(&mut book, "oatmeal").unwrap();
    assert_eq!(recipe.totals.calories, 300.0);
    assert_eq!(recipe.notes, "good");
    assert_eq!(
        recipe_ingredients(&mut book, "oatmeal")
            .unwrap()
            .records
            .len(),
        1
    );
    assert_eq!(daily_totals(&mut book, day(4)).unwrap().totals.calories, 300.0);
}

#[test]
fn renaming_an_ingredient_updates_recipes() {
    let mut book = stocked_book();
    save_recipe_ingredients(
        &mut book,
        "porridge",
        &[RecipeIngredient::new("porridge", "oats", 100.0, "grams").unwrap()],
    )
    .unwrap();

    let rolled = Ingredient::new("rolled oats", facts(380.0, 13.0, 67.0, 7.0), "grams").unwrap();
    edit_ingredient(&mut book, "oats", &rolled).unwrap();

    assert_eq!(get_recipe(&mut book, "porridge").unwrap().totals.calories, 200.0);
    let aggregate = recompute_recipe(&mut book, "porridge").unwrap();
    assert!(aggregate.skipped.is_empty());
    assert_eq!(aggregate.totals, facts(380.0, 13.0, 67.0, 7.0));

    delete_ingredient(&mut book, "rolled oats").unwrap();
    let aggregate = recompute_recipe(&mut book, "porridge").unwrap();
    assert_eq!(aggregate.totals, Nutrients::ZERO);
    assert_eq!(aggregate.skipped[0].item, "rolled oats");
}

#[test]
fn meals_are_found_by_composite_key() {
    let mut book = stocked_book();
    let breakfast = MealPlanEntry::new(day(5), MealType::Breakfast, "porridge", 1.0).unwrap();
    let snack = MealPlanEntry::new(day(5), MealType::Snack, "porridge", 0.5).unwrap();
    add_meal(&mut book, &breakfast).unwrap();
    add_meal(&mut book, &snack).unwrap();

    let bigger_snack = MealPlanEntry {
        portion_size: 1.5,
        ..snack.clone()
    };
    replace_meal(&mut book, &snack.key(), &bigger_snack).unwrap();
    delete_meal(&mut book, &breakfast.key()).unwrap();

    assert_eq!(
        meals_on(&mut book, day(5)).unwrap().into_records(),
        vec![bigger_snack]
    );
    assert!(matches!(
        delete_meal(&mut book, &breakfast.key()),
        Err(StoreError::NoSuchRecord {
            collection: Collection::MealPlan,
            ..
        })
    ));
}

#[test]
fn malformed_ingredient_rows_keep_their_key() {
    let mut book = test_book();
    let row: Vec<String> = ["", "12", "1", "1", "1", "grams"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    book.append_row(Collection::Ingredients, &row).unwrap();

    let listing = list_all::<Ingredient>(&mut book).unwrap();
    assert!(listing.records.is_empty());
    assert_eq!(listing.malformed[0].key, "");
    assert_eq!(listing.malformed[0].error.column, INGREDIENT_NAME);
}

#[test]
fn overflowing_totals_are_not_written() {
    let mut book = test_book();
    add_ingredient(
        &mut book,
        &Ingredient::new("brick", facts(1e308, 0.0, 0.0, 0.0), "grams").unwrap(),
    )
    .unwrap();
    add_recipe(&mut book, &Recipe::new("wall", "", "", 1.0).unwrap()).unwrap();

    let err = save_recipe_ingredients(
        &mut book,
        "wall",
        &[RecipeIngredient::new("wall", "brick", 1000.0, "grams").unwrap()],
    )
    .unwrap_err();
    assert!(matches!(
        &err,
        StoreError::Invalid(FieldError {
            problem: FieldProblem::OutOfRange,
            ..
        })
    ));
    assert!(!err.is_fatal());

    // The recipe keeps its previous totals and stays reachable.
    assert_eq!(get_recipe(&mut book, "wall").unwrap().totals, Nutrients::ZERO);
    assert!(recompute_recipe(&mut book, "wall").is_err());
    delete_recipe(&mut book, "wall").unwrap();
    assert_eq!(book.row_count(Collection::RecipeIngredients).unwrap(), 1);
}

#[test]
fn renaming_carries_unreadable_rows_along() {
    let mut book = stocked_book();
    let bad_usage: Vec<String> = ["porridge", "oats", "a handful", "grams"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    book.append_row(Collection::RecipeIngredients, &bad_usage)
        .unwrap();
    let bad_meal: Vec<String> = ["2024-05-06", "Dinner", "porridge", "lots"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    book.append_row(Collection::MealPlan, &bad_meal).unwrap();

    edit_recipe(
        &mut book,
        "porridge",
        Recipe::new("oatmeal", "stir", "", 2.0).unwrap(),
    )
    .unwrap();

    let usages = recipe_ingredients(&mut book, "oatmeal").unwrap();
    assert_eq!(usages.malformed.len(), 1);
    assert_eq!(usages.malformed[0].key, "oatmeal");
    assert_eq!(
        book.read_row(Collection::MealPlan, RowPosition::FIRST_DATA)
            .unwrap()
            .unwrap()[2],
        "oatmeal"
    );

    delete_recipe(&mut book, "oatmeal").unwrap();
    assert_eq!(book.row_count(Collection::RecipeIngredients).unwrap(), 1);
}

#[test]
fn renaming_an_ingredient_reaches_unreadable_rows() {
    let mut book = stocked_book();
    let bad_usage: Vec<String> = ["porridge", "oats", "a handful", "grams"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    book.append_row(Collection::RecipeIngredients, &bad_usage)
        .unwrap();

    let rolled = Ingredient::new("rolled oats", facts(380.0, 13.0, 67.0, 7.0), "grams").unwrap();
    edit_ingredient(&mut book, "oats", &rolled).unwrap();

    assert_eq!(
        book.read_row(Collection::RecipeIngredients, RowPosition::FIRST_DATA)
            .unwrap()
            .unwrap(),
        vec!["porridge", "rolled oats", "a handful", "grams"]
    );
}
