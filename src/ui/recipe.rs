use super::{nutrients_header, nutrients_row, store_result, UpdateEvent};
use crate::database::{self, Workbook};
use crate::query;
use crate::records::{
    parse_number, FieldError, Ingredient, Recipe, RecipeIngredient, QUANTITY, SERVINGS,
};
use eframe::egui;

/// Units offered when picking how much of an ingredient a recipe uses.
pub const UNITS: &[&str] = &[
    "grams",
    "ml",
    "pieces",
    "cups",
    "tablespoons",
    "teaspoons",
    "kg",
    "liters",
];

/// One row of the ingredient table as the user is typing it.
struct UsageRow {
    ingredient: String,
    quantity: String,
    unit: String,
}

impl UsageRow {
    fn new(usage: RecipeIngredient) -> Self {
        Self {
            ingredient: usage.ingredient,
            quantity: usage.quantity.to_string(),
            unit: usage.unit,
        }
    }

    fn parse(&self, recipe: &str) -> Result<RecipeIngredient, FieldError> {
        let quantity = parse_number(QUANTITY, &self.quantity)?;
        RecipeIngredient::new(recipe, &self.ingredient, quantity, &self.unit)
    }
}

pub struct RecipeWindow {
    recipe: Recipe,
    name: String,
    instructions: String,
    notes: String,
    servings: String,
    usages: Vec<UsageRow>,
    unreadable_usages: usize,
    ingredients: Vec<Ingredient>,
    new_ingredient: Option<usize>,
    edit_mode: bool,
}

impl RecipeWindow {
    pub fn new(book: &mut Workbook, name: &str, edit_mode: bool) -> database::Result<Self> {
        let recipe = query::get_recipe(book, name)?;
        let listing = query::recipe_ingredients(book, name)?;
        let unreadable_usages = listing.malformed.len();
        let usages = listing.into_records().into_iter().map(UsageRow::new).collect();
        let mut ingredients = query::list_all::<Ingredient>(book)?.into_records();
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            name: recipe.name.clone(),
            instructions: recipe.instructions.clone(),
            notes: recipe.notes.clone(),
            servings: recipe.servings.to_string(),
            recipe,
            usages,
            unreadable_usages,
            ingredients,
            new_ingredient: None,
            edit_mode,
        })
    }

    pub fn name(&self) -> &str {
        &self.recipe.name
    }

    /// Picks up changes made in other windows. While editing, only the ingredient choices are
    /// reloaded, and the names of used ingredients that no longer exist are returned.
    pub fn refresh(&mut self, book: &mut Workbook) -> database::Result<Vec<String>> {
        if !self.edit_mode {
            let name = self.recipe.name.clone();
            *self = Self::new(book, &name, false)?;
            return Ok(vec![]);
        }

        let mut ingredients = query::list_all::<Ingredient>(book)?.into_records();
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));
        self.ingredients = ingredients;
        self.new_ingredient = None;
        Ok(self.missing_ingredients())
    }

    fn missing_ingredients(&self) -> Vec<String> {
        self.usages
            .iter()
            .filter(|row| !self.ingredients.iter().any(|i| i.name == row.ingredient))
            .map(|row| row.ingredient.clone())
            .collect()
    }

    fn reload(&mut self, book: &mut Workbook, name: &str, events: &mut Vec<UpdateEvent>) {
        if let Some(window) = store_result(events, Self::new(book, name, self.edit_mode)) {
            *self = window;
        }
    }

    /// Validates every field before anything is written.
    fn parse(&self) -> Result<(Recipe, Vec<RecipeIngredient>), Vec<FieldError>> {
        let mut errors = vec![];
        let edited = parse_number(SERVINGS, &self.servings)
            .and_then(|servings| Recipe::new(&self.name, &self.instructions, &self.notes, servings))
            .map(|r| Recipe {
                totals: self.recipe.totals,
                ..r
            });
        let edited = edited.map_err(|e| errors.push(e)).ok();

        let name = edited.as_ref().map(|r| r.name.as_str()).unwrap_or(&self.recipe.name);
        let mut usages = vec![];
        for row in &self.usages {
            match row.parse(name) {
                Ok(usage) => usages.push(usage),
                Err(error) => errors.push(error),
            }
        }

        match edited {
            Some(edited) if errors.is_empty() => Ok((edited, usages)),
            _ => Err(errors),
        }
    }

    fn save(&mut self, book: &mut Workbook, events: &mut Vec<UpdateEvent>) {
        let (edited, usages) = match self.parse() {
            Ok(parsed) => parsed,
            Err(errors) => {
                for error in errors {
                    events.push(UpdateEvent::Invalid(error.to_string()));
                }
                return;
            }
        };

        let old_name = self.recipe.name.clone();
        let new_name = edited.name.clone();
        if store_result(events, query::edit_recipe(book, &old_name, edited)).is_none() {
            return;
        }
        if new_name != old_name {
            events.push(UpdateEvent::RecipeDeleted(old_name));
        }
        let Some(aggregate) = store_result(
            events,
            query::save_recipe_ingredients(book, &new_name, &usages),
        ) else {
            return;
        };

        events.push(UpdateEvent::Saved(format!(
            "Saved {new_name}: {:.2} calories",
            aggregate.totals.calories
        )));
        if !aggregate.skipped.is_empty() {
            events.push(UpdateEvent::Skipped(aggregate.skipped));
        }
        events.push(UpdateEvent::Changed);
        self.reload(book, &new_name, events);
    }

    fn recompute(&mut self, book: &mut Workbook, events: &mut Vec<UpdateEvent>) {
        let name = self.recipe.name.clone();
        let Some(aggregate) = store_result(events, query::recompute_recipe(book, &name)) else {
            return;
        };
        if !aggregate.skipped.is_empty() {
            events.push(UpdateEvent::Skipped(aggregate.skipped));
        }
        events.push(UpdateEvent::Changed);
        self.reload(book, &name, events);
    }

    fn update_ingredients(&mut self, ui: &mut egui::Ui) {
        let mut to_remove = None;
        egui::Grid::new(("recipe ingredient grid", &self.recipe.name))
            .striped(true)
            .show(ui, |ui| {
                ui.label("Ingredient");
                ui.label("Quantity");
                ui.label("Unit");
                ui.end_row();

                for (i, row) in self.usages.iter_mut().enumerate() {
                    if !self.edit_mode {
                        ui.label(&row.ingredient);
                        ui.label(&row.quantity);
                        ui.label(&row.unit);
                        ui.end_row();
                        continue;
                    }

                    egui::ComboBox::from_id_salt(("usage ingredient", &self.recipe.name, i))
                        .selected_text(row.ingredient.as_str())
                        .show_ui(ui, |ui| {
                            for ingredient in &self.ingredients {
                                ui.selectable_value(
                                    &mut row.ingredient,
                                    ingredient.name.clone(),
                                    &ingredient.name,
                                );
                            }
                        });
                    ui.add(egui::TextEdit::singleline(&mut row.quantity).desired_width(60.0));
                    egui::ComboBox::from_id_salt(("usage unit", &self.recipe.name, i))
                        .selected_text(row.unit.as_str())
                        .show_ui(ui, |ui| {
                            for unit in UNITS {
                                ui.selectable_value(&mut row.unit, unit.to_string(), *unit);
                            }
                        });
                    if ui.button("Remove").clicked() {
                        to_remove = Some(i);
                    }
                    ui.end_row();
                }
            });

        if self.unreadable_usages > 0 {
            ui.weak(format!(
                "{} unreadable ingredient rows",
                self.unreadable_usages
            ));
        }

        if let Some(i) = to_remove {
            self.usages.remove(i);
        }

        if self.edit_mode {
            ui.horizontal(|ui| {
                ui.label("Add Ingredient:");
                let selected = self
                    .new_ingredient
                    .and_then(|i| self.ingredients.get(i))
                    .map(|i| i.name.as_str())
                    .unwrap_or("");
                egui::ComboBox::from_id_salt(("new usage ingredient", &self.recipe.name))
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for (i, ingredient) in self.ingredients.iter().enumerate() {
                            ui.selectable_value(
                                &mut self.new_ingredient,
                                Some(i),
                                &ingredient.name,
                            );
                        }
                    });
                if ui.button("Add").clicked() {
                    let picked = self.new_ingredient.and_then(|i| self.ingredients.get(i));
                    if let Some(ingredient) = picked {
                        let unit = if ingredient.unit.is_empty() {
                            "grams".into()
                        } else {
                            ingredient.unit.clone()
                        };
                        self.usages.push(UsageRow {
                            ingredient: ingredient.name.clone(),
                            quantity: "100".into(),
                            unit,
                        });
                        self.new_ingredient = None;
                    }
                }
            });
        }
    }

    fn update_information(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new(("recipe information", &self.recipe.name)).show(ui, |ui| {
            if self.edit_mode {
                ui.label("Name:");
                ui.add(egui::TextEdit::singleline(&mut self.name));
                ui.end_row();
            }

            ui.label("Servings:");
            if self.edit_mode {
                ui.add(egui::TextEdit::singleline(&mut self.servings).desired_width(60.0));
            } else {
                ui.label(&self.servings);
            }
            ui.end_row();

            ui.label("Instructions:");
            if self.edit_mode {
                ui.add(egui::TextEdit::multiline(&mut self.instructions));
            } else {
                ui.label(&self.instructions);
            }
            ui.end_row();

            ui.label("Notes:");
            if self.edit_mode {
                ui.add(egui::TextEdit::multiline(&mut self.notes));
            } else {
                ui.label(&self.notes);
            }
            ui.end_row();
        });

        egui::Grid::new(("recipe totals", &self.recipe.name)).show(ui, |ui| {
            ui.label("");
            nutrients_header(ui);
            ui.end_row();

            ui.label("Total");
            nutrients_row(ui, &self.recipe.totals);
            ui.end_row();

            ui.label("Per serving");
            nutrients_row(
                ui,
                &self.recipe.totals.scaled(1.0 / self.recipe.servings).rounded(),
            );
            ui.end_row();
        });
    }

    pub fn update(&mut self, ctx: &egui::Context, book: &mut Workbook) -> Vec<UpdateEvent> {
        let mut events = vec![];
        let mut open = true;
        let mut save = false;
        let mut recompute = false;
        let mut cancel = false;

        egui::Window::new(self.recipe.name.clone())
            .id(egui::Id::new(("recipe", self.recipe.name.clone())))
            .open(&mut open)
            .show(ctx, |ui| {
                self.update_ingredients(ui);
                ui.separator();
                self.update_information(ui);
                ui.separator();
                ui.horizontal(|ui| {
                    let was_editing = self.edit_mode;
                    ui.toggle_value(&mut self.edit_mode, "Edit");
                    if was_editing && !self.edit_mode {
                        cancel = true;
                    }
                    if self.edit_mode && ui.button("Save").clicked() {
                        save = true;
                    }
                    if !self.edit_mode && ui.button("Recalculate").clicked() {
                        recompute = true;
                    }
                });
            });

        if save {
            self.save(book, &mut events);
        } else if recompute {
            self.recompute(book, &mut events);
        } else if cancel {
            let name = self.recipe.name.clone();
            self.reload(book, &name, &mut events);
        }
        if !open {
            events.push(UpdateEvent::Closed);
        }
        events
    }
}

#[cfg(test)]
use crate::nutrition::Nutrients;

#[cfg(test)]
fn porridge_book() -> Workbook {
    let mut book = Workbook::open_in_memory().unwrap();
    query::initialize(&mut book).unwrap();
    let oats = Nutrients {
        calories: 380.0,
        ..Nutrients::ZERO
    };
    query::add_ingredient(&mut book, &Ingredient::new("oats", oats, "grams").unwrap()).unwrap();
    query::add_recipe(&mut book, &Recipe::new("porridge", "", "", 1.0).unwrap()).unwrap();
    query::save_recipe_ingredients(
        &mut book,
        "porridge",
        &[RecipeIngredient::new("porridge", "oats", 100.0, "grams").unwrap()],
    )
    .unwrap();
    book
}

#[cfg(test)]
fn rename_oats(book: &mut Workbook) {
    let rolled = Ingredient::new("rolled oats", Nutrients::ZERO, "grams").unwrap();
    query::edit_ingredient(book, "oats", &rolled).unwrap();
}

#[test]
fn open_recipe_follows_ingredient_renames() {
    let mut book = porridge_book();
    let mut window = RecipeWindow::new(&mut book, "porridge", false).unwrap();

    rename_oats(&mut book);
    assert!(window.refresh(&mut book).unwrap().is_empty());

    assert_eq!(window.usages[0].ingredient, "rolled oats");
    assert_eq!(window.ingredients[0].name, "rolled oats");
}

#[test]
fn edited_recipe_keeps_input_and_reports_missing_ingredients() {
    let mut book = porridge_book();
    let mut window = RecipeWindow::new(&mut book, "porridge", true).unwrap();
    window.usages[0].quantity = "250".into();

    rename_oats(&mut book);
    assert_eq!(window.refresh(&mut book).unwrap(), vec!["oats".to_string()]);

    assert_eq!(window.usages[0].quantity, "250");
    assert_eq!(window.ingredients[0].name, "rolled oats");
}

#[test]
fn refreshing_a_deleted_recipe_fails() {
    let mut book = porridge_book();
    let mut window = RecipeWindow::new(&mut book, "porridge", false).unwrap();

    query::delete_recipe(&mut book, "porridge").unwrap();
    assert!(matches!(
        window.refresh(&mut book),
        Err(database::StoreError::NoSuchRecord { .. })
    ));
}
