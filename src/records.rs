// Copyright 2023 Remi Bernotavicius

use crate::database::models::Collection;
use crate::database::StoreError;
use crate::nutrition::Nutrients;
use derive_more::Display;
use std::fmt;
use strum::{EnumIter, EnumString};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const RECIPE_NAME: &str = "Recipe Name";
pub const INSTRUCTIONS: &str = "Instructions";
pub const NOTES: &str = "Notes";
pub const TOTAL_CALORIES: &str = "Total Calories";
pub const TOTAL_PROTEIN: &str = "Total Protein (g)";
pub const TOTAL_CARBS: &str = "Total Carbohydrates (g)";
pub const TOTAL_FAT: &str = "Total Fat (g)";
pub const SERVINGS: &str = "Portion Size (e.g., servings)";

pub const INGREDIENT_NAME: &str = "Ingredient Name";
pub const CALORIES_PER_100: &str = "Calories (per 100g)";
pub const PROTEIN_PER_100: &str = "Protein (g per 100g)";
pub const CARBS_PER_100: &str = "Carbohydrates (g per 100g)";
pub const FAT_PER_100: &str = "Fat (g per 100g)";
pub const INGREDIENT_UNIT: &str = "Unit (e.g., grams, ml, piece)";

pub const QUANTITY: &str = "Quantity";
pub const USAGE_UNIT: &str = "Unit (of ingredient, e.g., grams, ml)";

pub const DATE: &str = "Date";
pub const MEAL_TYPE: &str = "Meal Type";
pub const PORTION_SIZE: &str =
    "Portion Size (for the meal plan, referring to the recipe's portion size)";

const TOTAL_COLUMNS: [&str; 4] = [TOTAL_CALORIES, TOTAL_PROTEIN, TOTAL_CARBS, TOTAL_FAT];
const PER_100_COLUMNS: [&str; 4] = [
    CALORIES_PER_100,
    PROTEIN_PER_100,
    CARBS_PER_100,
    FAT_PER_100,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    Missing,
    NotANumber,
    OutOfRange,
    BadDate,
    UnknownMealType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub column: &'static str,
    pub value: String,
    pub problem: FieldProblem,
}

impl FieldError {
    fn new(column: &'static str, value: impl Into<String>, problem: FieldProblem) -> Self {
        Self {
            column,
            value: value.into(),
            problem,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            column,
            value,
            problem,
        } = self;
        match problem {
            FieldProblem::Missing => write!(f, "{column:?} is missing"),
            FieldProblem::NotANumber => write!(f, "{column:?}: {value:?} is not a number"),
            FieldProblem::OutOfRange => write!(f, "{column:?}: {value} is out of range"),
            FieldProblem::BadDate => {
                write!(f, "{column:?}: {value:?} is not a date like 2024-01-31")
            }
            FieldProblem::UnknownMealType => write!(f, "{column:?}: {value:?} is not a meal type"),
        }
    }
}

impl std::error::Error for FieldError {}

type Result<T> = std::result::Result<T, FieldError>;

/// Parses user or sheet input for a numeric column.
pub fn parse_number(column: &'static str, text: &str) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FieldError::new(column, text, FieldProblem::Missing));
    }
    let value: f64 = text
        .parse()
        .map_err(|_| FieldError::new(column, text, FieldProblem::NotANumber))?;
    if !value.is_finite() {
        return Err(FieldError::new(column, text, FieldProblem::NotANumber));
    }
    Ok(value)
}

fn non_negative(column: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(FieldError::new(
            column,
            value.to_string(),
            FieldProblem::OutOfRange,
        ))
    }
}

fn positive(column: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FieldError::new(
            column,
            value.to_string(),
            FieldProblem::OutOfRange,
        ))
    }
}

fn required_text(column: &'static str, text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FieldError::new(column, text, FieldProblem::Missing));
    }
    Ok(text.into())
}

fn check_nutrients(nutrients: Nutrients, columns: [&'static str; 4]) -> Result<Nutrients> {
    for (value, column) in nutrients.values().into_iter().zip(columns) {
        non_negative(column, value)?;
    }
    Ok(nutrients)
}

fn number_cell(value: f64) -> String {
    value.to_string()
}

/// The first row of a sheet, naming its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.trim() == column)
    }

    pub fn check(
        &self,
        collection: Collection,
        required: &[&'static str],
    ) -> crate::database::Result<()> {
        for &column in required {
            if self.index_of(column).is_none() {
                return Err(StoreError::MissingColumn { collection, column });
            }
        }
        Ok(())
    }

    /// Lays out named values in this header's column order.
    pub fn arrange(
        &self,
        collection: Collection,
        fields: Vec<(&'static str, String)>,
    ) -> crate::database::Result<Vec<String>> {
        let mut row = vec![String::new(); self.columns.len()];
        for (column, value) in fields {
            let index = self
                .index_of(column)
                .ok_or(StoreError::MissingColumn { collection, column })?;
            row[index] = value;
        }
        Ok(row)
    }
}

/// One row read through its sheet's header.
pub struct Fields<'a> {
    header: &'a Header,
    cells: &'a [String],
}

impl<'a> Fields<'a> {
    pub fn new(header: &'a Header, cells: &'a [String]) -> Self {
        Self { header, cells }
    }

    /// The raw cell, or an empty string when the column or cell doesn't exist.
    pub fn text(&self, column: &str) -> &'a str {
        self.header
            .index_of(column)
            .and_then(|i| self.cells.get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn number(&self, column: &'static str) -> Result<f64> {
        parse_number(column, self.text(column))
    }

    fn nutrients(&self, columns: [&'static str; 4]) -> Result<Nutrients> {
        let [calories, protein, carbs, fat] = columns;
        Ok(Nutrients {
            calories: self.number(calories)?,
            protein: self.number(protein)?,
            carbs: self.number(carbs)?,
            fat: self.number(fat)?,
        })
    }
}

/// A typed row of one of the workbook's collections.
pub trait Record: Sized {
    const COLLECTION: Collection;
    const COLUMNS: &'static [&'static str];

    /// Column used to attribute a row to its owner even when the row doesn't parse.
    const KEY_COLUMN: &'static str;

    fn from_fields(fields: &Fields<'_>) -> Result<Self>;

    fn to_fields(&self) -> Vec<(&'static str, String)>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub per_100: Nutrients,
    pub unit: String,
}

impl Ingredient {
    pub fn new(name: &str, per_100: Nutrients, unit: &str) -> Result<Self> {
        Ok(Self {
            name: required_text(INGREDIENT_NAME, name)?,
            per_100: check_nutrients(per_100, PER_100_COLUMNS)?,
            unit: unit.trim().into(),
        })
    }
}

impl Record for Ingredient {
    const COLLECTION: Collection = Collection::Ingredients;
    const COLUMNS: &'static [&'static str] = &[
        INGREDIENT_NAME,
        CALORIES_PER_100,
        PROTEIN_PER_100,
        CARBS_PER_100,
        FAT_PER_100,
        INGREDIENT_UNIT,
    ];
    const KEY_COLUMN: &'static str = INGREDIENT_NAME;

    fn from_fields(fields: &Fields<'_>) -> Result<Self> {
        Self::new(
            fields.text(INGREDIENT_NAME),
            fields.nutrients(PER_100_COLUMNS)?,
            fields.text(INGREDIENT_UNIT),
        )
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![(INGREDIENT_NAME, self.name.clone())];
        fields.extend(
            PER_100_COLUMNS
                .into_iter()
                .zip(self.per_100.values().map(number_cell)),
        );
        fields.push((INGREDIENT_UNIT, self.unit.clone()));
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub instructions: String,
    pub notes: String,
    /// Derived from the recipe's ingredients whenever they are saved.
    pub totals: Nutrients,
    pub servings: f64,
}

impl Recipe {
    pub fn new(name: &str, instructions: &str, notes: &str, servings: f64) -> Result<Self> {
        Ok(Self {
            name: required_text(RECIPE_NAME, name)?,
            instructions: instructions.into(),
            notes: notes.into(),
            totals: Nutrients::ZERO,
            servings: positive(SERVINGS, servings)?,
        })
    }

    pub fn with_totals(self, totals: Nutrients) -> Result<Self> {
        Ok(Self {
            totals: check_nutrients(totals, TOTAL_COLUMNS)?,
            ..self
        })
    }
}

impl Record for Recipe {
    const COLLECTION: Collection = Collection::Recipes;
    const COLUMNS: &'static [&'static str] = &[
        RECIPE_NAME,
        INSTRUCTIONS,
        NOTES,
        TOTAL_CALORIES,
        TOTAL_PROTEIN,
        TOTAL_CARBS,
        TOTAL_FAT,
        SERVINGS,
    ];
    const KEY_COLUMN: &'static str = RECIPE_NAME;

    fn from_fields(fields: &Fields<'_>) -> Result<Self> {
        Self::new(
            fields.text(RECIPE_NAME),
            fields.text(INSTRUCTIONS),
            fields.text(NOTES),
            fields.number(SERVINGS)?,
        )?
        .with_totals(fields.nutrients(TOTAL_COLUMNS)?)
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            (RECIPE_NAME, self.name.clone()),
            (INSTRUCTIONS, self.instructions.clone()),
            (NOTES, self.notes.clone()),
        ];
        fields.extend(
            TOTAL_COLUMNS
                .into_iter()
                .zip(self.totals.values().map(number_cell)),
        );
        fields.push((SERVINGS, number_cell(self.servings)));
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeIngredient {
    pub recipe: String,
    pub ingredient: String,
    /// Absolute amount used by the recipe, in the ingredient's unit.
    pub quantity: f64,
    pub unit: String,
}

impl RecipeIngredient {
    pub fn new(recipe: &str, ingredient: &str, quantity: f64, unit: &str) -> Result<Self> {
        Ok(Self {
            recipe: required_text(RECIPE_NAME, recipe)?,
            ingredient: required_text(INGREDIENT_NAME, ingredient)?,
            quantity: non_negative(QUANTITY, quantity)?,
            unit: unit.trim().into(),
        })
    }
}

impl Record for RecipeIngredient {
    const COLLECTION: Collection = Collection::RecipeIngredients;
    const COLUMNS: &'static [&'static str] = &[RECIPE_NAME, INGREDIENT_NAME, QUANTITY, USAGE_UNIT];
    const KEY_COLUMN: &'static str = RECIPE_NAME;

    fn from_fields(fields: &Fields<'_>) -> Result<Self> {
        Self::new(
            fields.text(RECIPE_NAME),
            fields.text(INGREDIENT_NAME),
            fields.number(QUANTITY)?,
            fields.text(USAGE_UNIT),
        )
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (RECIPE_NAME, self.recipe.clone()),
            (INGREDIENT_NAME, self.ingredient.clone()),
            (QUANTITY, number_cell(self.quantity)),
            (USAGE_UNIT, self.unit.clone()),
        ]
    }
}

#[derive(
    Debug, Display, EnumIter, EnumString, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum MealType {
    #[display("Breakfast")]
    Breakfast,
    #[display("Lunch")]
    Lunch,
    #[display("Dinner")]
    Dinner,
    #[display("Snack")]
    Snack,
}

impl MealType {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

/// The composite key identifying a meal plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MealKey {
    pub date: chrono::NaiveDate,
    pub meal_type: MealType,
    pub recipe: String,
}

impl fmt::Display for MealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.date.format(DATE_FORMAT),
            self.meal_type,
            self.recipe
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealPlanEntry {
    pub date: chrono::NaiveDate,
    pub meal_type: MealType,
    pub recipe: String,
    /// Multiplier against the recipe's serving count.
    pub portion_size: f64,
}

impl MealPlanEntry {
    pub fn new(
        date: chrono::NaiveDate,
        meal_type: MealType,
        recipe: &str,
        portion_size: f64,
    ) -> Result<Self> {
        Ok(Self {
            date,
            meal_type,
            recipe: required_text(RECIPE_NAME, recipe)?,
            portion_size: positive(PORTION_SIZE, portion_size)?,
        })
    }

    pub fn key(&self) -> MealKey {
        MealKey {
            date: self.date,
            meal_type: self.meal_type,
            recipe: self.recipe.clone(),
        }
    }
}

pub fn parse_date(column: &'static str, text: &str) -> Result<chrono::NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FieldError::new(column, text, FieldProblem::Missing));
    }
    chrono::NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| FieldError::new(column, text, FieldProblem::BadDate))
}

impl Record for MealPlanEntry {
    const COLLECTION: Collection = Collection::MealPlan;
    const COLUMNS: &'static [&'static str] = &[DATE, MEAL_TYPE, RECIPE_NAME, PORTION_SIZE];
    const KEY_COLUMN: &'static str = DATE;

    fn from_fields(fields: &Fields<'_>) -> Result<Self> {
        let meal_type = fields.text(MEAL_TYPE).trim();
        Self::new(
            parse_date(DATE, fields.text(DATE))?,
            meal_type
                .parse::<MealType>()
                .map_err(|_| FieldError::new(MEAL_TYPE, meal_type, FieldProblem::UnknownMealType))?,
            fields.text(RECIPE_NAME),
            fields.number(PORTION_SIZE)?,
        )
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (DATE, self.date.format(DATE_FORMAT).to_string()),
            (MEAL_TYPE, self.meal_type.to_string()),
            (RECIPE_NAME, self.recipe.clone()),
            (PORTION_SIZE, number_cell(self.portion_size)),
        ]
    }
}

#[cfg(test)]
fn header(columns: &[&str]) -> Header {
    Header::new(columns.iter().map(|c| c.to_string()).collect())
}

#[cfg(test)]
fn cells(values: &[&str]) -> Vec<String> {
    values.iter().map(|c| c.to_string()).collect()
}

#[test]
fn fields_are_found_by_header_name() {
    let header = header(&[QUANTITY, USAGE_UNIT, INGREDIENT_NAME, RECIPE_NAME]);
    let row = cells(&["150", "grams", "flour", "bread"]);

    let usage = RecipeIngredient::from_fields(&Fields::new(&header, &row)).unwrap();
    assert_eq!(
        usage,
        RecipeIngredient::new("bread", "flour", 150.0, "grams").unwrap()
    );
    assert_eq!(
        header.arrange(Collection::RecipeIngredients, usage.to_fields()).unwrap(),
        row
    );
}

#[test]
fn arrange_needs_every_column() {
    let header = header(&[RECIPE_NAME, INGREDIENT_NAME]);
    let usage = RecipeIngredient::new("bread", "flour", 1.0, "").unwrap();
    assert!(matches!(
        header.arrange(Collection::RecipeIngredients, usage.to_fields()),
        Err(StoreError::MissingColumn {
            column: QUANTITY,
            ..
        })
    ));
}

#[test]
fn malformed_numbers_name_their_column() {
    let header = header(Ingredient::COLUMNS);
    let row = cells(&["flour", "364", "lots", "76", "1", "grams"]);

    let error = Ingredient::from_fields(&Fields::new(&header, &row)).unwrap_err();
    assert_eq!(
        error,
        FieldError::new(PROTEIN_PER_100, "lots", FieldProblem::NotANumber)
    );

    let row = cells(&["flour", "364", "", "76", "1", "grams"]);
    let error = Ingredient::from_fields(&Fields::new(&header, &row)).unwrap_err();
    assert_eq!(error.problem, FieldProblem::Missing);
}

#[test]
fn constructors_validate() {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    assert_eq!(
        MealPlanEntry::new(date, MealType::Lunch, "soup", 0.0)
            .unwrap_err()
            .problem,
        FieldProblem::OutOfRange
    );
    assert_eq!(
        Recipe::new("  ", "", "", 1.0).unwrap_err().problem,
        FieldProblem::Missing
    );
    assert_eq!(
        Recipe::new("soup", "", "", -2.0).unwrap_err().column,
        SERVINGS
    );
    assert_eq!(
        RecipeIngredient::new("soup", "salt", -1.0, "g")
            .unwrap_err()
            .column,
        QUANTITY
    );
    let negative_fat = Nutrients {
        fat: -1.0,
        ..Nutrients::ZERO
    };
    assert_eq!(
        Ingredient::new("lard", negative_fat, "g").unwrap_err().column,
        FAT_PER_100
    );
    assert_eq!(
        Recipe::new(" soup ", "", "", 2.0).unwrap().name,
        "soup".to_string()
    );
}

#[test]
fn meal_plan_entries_parse() {
    let header = header(MealPlanEntry::COLUMNS);
    let row = cells(&["2024-03-01", "Dinner", "soup", "1.5"]);
    let entry = MealPlanEntry::from_fields(&Fields::new(&header, &row)).unwrap();
    assert_eq!(entry.meal_type, MealType::Dinner);
    assert_eq!(entry.portion_size, 1.5);
    assert_eq!(entry.key().to_string(), "2024-03-01 Dinner: soup");

    let row = cells(&["03/01/2024", "Dinner", "soup", "1.5"]);
    assert_eq!(
        MealPlanEntry::from_fields(&Fields::new(&header, &row))
            .unwrap_err()
            .problem,
        FieldProblem::BadDate
    );

    let row = cells(&["2024-03-01", "Brunch", "soup", "1.5"]);
    assert_eq!(
        MealPlanEntry::from_fields(&Fields::new(&header, &row))
            .unwrap_err()
            .problem,
        FieldProblem::UnknownMealType
    );
}

#[test]
fn recipe_cells_use_plain_numbers() {
    let recipe = Recipe::new("soup", "boil", "", 4.0)
        .unwrap()
        .with_totals(Nutrients {
            calories: 300.0,
            protein: 12.5,
            carbs: 40.0,
            fat: 0.25,
        })
        .unwrap();
    let row = header(Recipe::COLUMNS)
        .arrange(Collection::Recipes, recipe.to_fields())
        .unwrap();
    assert_eq!(
        row,
        cells(&["soup", "boil", "", "300", "12.5", "40", "0.25", "4"])
    );
}
