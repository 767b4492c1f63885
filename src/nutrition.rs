// Copyright 2023 Remi Bernotavicius

use crate::database::models::RowPosition;
use crate::records::{FieldError, MealPlanEntry, Recipe, RecipeIngredient};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, AddAssign};

/// Calories and macronutrients. Used both for per-100 unit facts and for totals.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Nutrients {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Nutrients {
    pub const ZERO: Self = Self {
        calories: 0.0,
        protein: 0.0,
        carbs: 0.0,
        fat: 0.0,
    };

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
        }
    }

    pub fn rounded(&self) -> Self {
        Self {
            calories: round_to_hundredths(self.calories),
            protein: round_to_hundredths(self.protein),
            carbs: round_to_hundredths(self.carbs),
            fat: round_to_hundredths(self.fat),
        }
    }

    pub fn values(&self) -> [f64; 4] {
        [self.calories, self.protein, self.carbs, self.fat]
    }
}

impl Add for Nutrients {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            calories: self.calories + other.calories,
            protein: self.protein + other.protein,
            carbs: self.carbs + other.carbs,
            fat: self.fat + other.fat,
        }
    }
}

impl AddAssign for Nutrients {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnknownIngredient,
    UnknownRecipe,
    Malformed {
        position: RowPosition,
        error: FieldError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub item: String,
    pub reason: SkipReason,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item = &self.item;
        match &self.reason {
            SkipReason::UnknownIngredient => write!(f, "skipped {item}: no such ingredient"),
            SkipReason::UnknownRecipe => write!(f, "skipped {item}: no such recipe"),
            SkipReason::Malformed { position, error } => {
                write!(f, "skipped {item} (row {position}): {error}")
            }
        }
    }
}

/// Totals over a set of items, along with every item that couldn't be counted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Aggregate {
    pub totals: Nutrients,
    pub counted: usize,
    pub skipped: Vec<Skipped>,
}

impl Aggregate {
    pub fn skip(&mut self, item: impl Into<String>, reason: SkipReason) {
        let skipped = Skipped {
            item: item.into(),
            reason,
        };
        log::warn!("{skipped}");
        self.skipped.push(skipped);
    }

    fn count(&mut self, nutrients: Nutrients) {
        self.totals += nutrients;
        self.counted += 1;
    }
}

/// Sums each ingredient's per-100 facts scaled by `quantity / 100`. Ingredients without facts
/// are skipped. Totals are rounded to two decimal places.
pub fn compute_recipe_totals(
    ingredient_facts: &HashMap<String, Nutrients>,
    recipe_ingredients: &[RecipeIngredient],
) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for usage in recipe_ingredients {
        match ingredient_facts.get(&usage.ingredient) {
            Some(per_100) => aggregate.count(per_100.scaled(usage.quantity / 100.0)),
            None => aggregate.skip(usage.ingredient.clone(), SkipReason::UnknownIngredient),
        }
    }
    aggregate.totals = aggregate.totals.rounded();
    aggregate
}

/// Sums each meal's recipe totals scaled by `portion_size / servings`. Meals whose recipe is
/// missing are skipped.
pub fn compute_daily_totals(
    meal_entries: &[MealPlanEntry],
    recipes: &HashMap<String, Recipe>,
) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for entry in meal_entries {
        match recipes.get(&entry.recipe) {
            Some(recipe) => {
                aggregate.count(recipe.totals.scaled(entry.portion_size / recipe.servings))
            }
            None => aggregate.skip(entry.key().to_string(), SkipReason::UnknownRecipe),
        }
    }
    aggregate
}

#[cfg(test)]
use crate::records::MealType;
#[cfg(test)]
use maplit::hashmap;

#[cfg(test)]
fn calories(calories: f64) -> Nutrients {
    Nutrients {
        calories,
        ..Nutrients::ZERO
    }
}

#[cfg(test)]
fn usage(ingredient: &str, quantity: f64) -> RecipeIngredient {
    RecipeIngredient::new("recipe", ingredient, quantity, "grams").unwrap()
}

#[cfg(test)]
fn recipe(name: &str, totals: Nutrients, servings: f64) -> Recipe {
    Recipe::new(name, "", "", servings)
        .unwrap()
        .with_totals(totals)
        .unwrap()
}

#[cfg(test)]
fn meal(recipe: &str, portion_size: f64) -> MealPlanEntry {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    MealPlanEntry::new(date, MealType::Dinner, recipe, portion_size).unwrap()
}

#[test]
fn single_ingredient_scales_by_quantity() {
    let facts = hashmap! { "oats".to_string() => calories(200.0) };
    let aggregate = compute_recipe_totals(&facts, &[usage("oats", 150.0)]);
    assert_eq!(aggregate.totals, calories(300.0));
    assert_eq!(aggregate.counted, 1);
    assert!(aggregate.skipped.is_empty());
}

#[test]
fn recipe_totals_are_rounded() {
    let facts = hashmap! {
        "apple".to_string() => Nutrients {
            calories: 52.0,
            protein: 0.26,
            carbs: 13.81,
            fat: 0.17,
        },
    };
    let aggregate = compute_recipe_totals(&facts, &[usage("apple", 123.0)]);
    assert_eq!(
        aggregate.totals,
        Nutrients {
            calories: 63.96,
            protein: 0.32,
            carbs: 16.99,
            fat: 0.21,
        }
    );
}

#[test]
fn recipe_totals_sum_every_ingredient() {
    let facts = hashmap! {
        "flour".to_string() => Nutrients {
            calories: 364.0,
            protein: 10.0,
            carbs: 76.0,
            fat: 1.0,
        },
        "butter".to_string() => Nutrients {
            calories: 717.0,
            protein: 1.0,
            carbs: 0.0,
            fat: 81.0,
        },
    };
    let aggregate =
        compute_recipe_totals(&facts, &[usage("flour", 200.0), usage("butter", 50.0)]);
    assert_eq!(
        aggregate.totals,
        Nutrients {
            calories: 728.0 + 358.5,
            protein: 20.0 + 0.5,
            carbs: 152.0,
            fat: 2.0 + 40.5,
        }
    );
    assert_eq!(aggregate.counted, 2);
}

#[test]
fn unknown_ingredients_contribute_nothing() {
    let facts = hashmap! { "oats".to_string() => calories(200.0) };
    let aggregate =
        compute_recipe_totals(&facts, &[usage("oats", 50.0), usage("unobtainium", 500.0)]);
    assert_eq!(aggregate.totals, calories(100.0));
    assert_eq!(
        aggregate.skipped,
        vec![Skipped {
            item: "unobtainium".into(),
            reason: SkipReason::UnknownIngredient,
        }]
    );
}

#[test]
fn portion_scales_against_servings() {
    let recipes = hashmap! { "stew".to_string() => recipe("stew", calories(400.0), 4.0) };
    let aggregate = compute_daily_totals(&[meal("stew", 2.0)], &recipes);
    assert_eq!(aggregate.totals, calories(200.0));
}

#[test]
fn daily_totals_are_linear_in_portion_size() {
    let recipes = hashmap! {
        "stew".to_string() => recipe("stew", calories(400.0), 4.0),
        "salad".to_string() => recipe("salad", calories(300.0), 2.0),
    };
    let single = compute_daily_totals(&[meal("stew", 1.0), meal("salad", 1.5)], &recipes);
    let doubled = compute_daily_totals(&[meal("stew", 2.0), meal("salad", 1.5)], &recipes);

    let stew_alone = compute_daily_totals(&[meal("stew", 1.0)], &recipes);
    assert_eq!(
        doubled.totals.calories - single.totals.calories,
        stew_alone.totals.calories
    );
    assert_eq!(single.totals.calories, 325.0);
}

#[test]
fn meals_without_recipes_are_skipped() {
    let recipes = hashmap! { "stew".to_string() => recipe("stew", calories(400.0), 4.0) };
    let aggregate = compute_daily_totals(&[meal("stew", 1.0), meal("ghost", 1.0)], &recipes);
    assert_eq!(aggregate.totals, calories(100.0));
    assert_eq!(aggregate.counted, 1);
    assert_eq!(aggregate.skipped[0].reason, SkipReason::UnknownRecipe);
    assert_eq!(
        aggregate.skipped[0].to_string(),
        "skipped 2024-03-01 Dinner: ghost: no such recipe"
    );
}
