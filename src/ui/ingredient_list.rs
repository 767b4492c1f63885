use super::{nutrients_header, nutrients_row, store_result, UpdateEvent};
use crate::database::{self, Workbook};
use crate::nutrition::Nutrients;
use crate::query;
use crate::records::{
    parse_number, FieldError, Ingredient, CALORIES_PER_100, CARBS_PER_100, FAT_PER_100,
    PROTEIN_PER_100,
};
#[cfg(test)]
use crate::records::INGREDIENT_NAME;
use eframe::egui;

/// Text fields for an ingredient, parsed only when saved.
struct IngredientForm {
    name: String,
    calories: String,
    protein: String,
    carbs: String,
    fat: String,
    unit: String,
}

impl Default for IngredientForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            calories: "0".into(),
            protein: "0".into(),
            carbs: "0".into(),
            fat: "0".into(),
            unit: "grams".into(),
        }
    }
}

impl IngredientForm {
    fn new(ingredient: &Ingredient) -> Self {
        let per_100 = &ingredient.per_100;
        Self {
            name: ingredient.name.clone(),
            calories: per_100.calories.to_string(),
            protein: per_100.protein.to_string(),
            carbs: per_100.carbs.to_string(),
            fat: per_100.fat.to_string(),
            unit: ingredient.unit.clone(),
        }
    }

    /// Parses every field, reporting all of the problems rather than the first.
    fn parse(&self) -> Result<Ingredient, Vec<FieldError>> {
        let mut errors = vec![];
        let mut number = |column, text: &str| {
            parse_number(column, text).unwrap_or_else(|error| {
                errors.push(error);
                0.0
            })
        };
        let per_100 = Nutrients {
            calories: number(CALORIES_PER_100, &self.calories),
            protein: number(PROTEIN_PER_100, &self.protein),
            carbs: number(CARBS_PER_100, &self.carbs),
            fat: number(FAT_PER_100, &self.fat),
        };
        match Ingredient::new(&self.name, per_100, &self.unit) {
            Ok(ingredient) if errors.is_empty() => Ok(ingredient),
            Ok(_) => Err(errors),
            Err(error) => {
                errors.push(error);
                Err(errors)
            }
        }
    }

    fn show(&mut self, ui: &mut egui::Ui) {
        ui.add(egui::TextEdit::singleline(&mut self.name).desired_width(140.0));
        for value in [
            &mut self.calories,
            &mut self.protein,
            &mut self.carbs,
            &mut self.fat,
        ] {
            ui.add(egui::TextEdit::singleline(value).desired_width(60.0));
        }
        ui.add(egui::TextEdit::singleline(&mut self.unit).desired_width(60.0));
    }
}

enum Action {
    Edit(usize),
    Delete(String),
    SaveEdit,
    CancelEdit,
    Add,
}

pub struct IngredientListWindow {
    ingredients: Vec<Ingredient>,
    unreadable: usize,
    edit_mode: bool,
    new_ingredient: IngredientForm,
    being_edited: Option<(String, IngredientForm)>,
}

impl IngredientListWindow {
    pub fn new(book: &mut Workbook, edit_mode: bool) -> database::Result<Self> {
        let listing = query::list_all::<Ingredient>(book)?;
        let unreadable = listing.malformed.len();
        let mut ingredients = listing.into_records();
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            ingredients,
            unreadable,
            edit_mode,
            new_ingredient: Default::default(),
            being_edited: None,
        })
    }

    /// Reloads the list, keeping whatever is being typed.
    pub fn refresh(&mut self, book: &mut Workbook) -> database::Result<()> {
        let fresh = Self::new(book, self.edit_mode)?;
        self.ingredients = fresh.ingredients;
        self.unreadable = fresh.unreadable;
        Ok(())
    }

    fn perform(&mut self, action: Action, book: &mut Workbook, events: &mut Vec<UpdateEvent>) {
        match action {
            Action::Edit(i) => {
                if let Some(ingredient) = self.ingredients.get(i) {
                    self.being_edited =
                        Some((ingredient.name.clone(), IngredientForm::new(ingredient)));
                }
            }
            Action::CancelEdit => self.being_edited = None,
            Action::SaveEdit => {
                let Some((old_name, form)) = &self.being_edited else {
                    return;
                };
                let edited = match form.parse() {
                    Ok(edited) => edited,
                    Err(errors) => {
                        events.extend(errors.iter().map(|e| UpdateEvent::Invalid(e.to_string())));
                        return;
                    }
                };
                if store_result(events, query::edit_ingredient(book, old_name, &edited)).is_some()
                {
                    self.being_edited = None;
                    events.push(UpdateEvent::Saved(format!("Saved {}", edited.name)));
                    events.push(UpdateEvent::Changed);
                }
            }
            Action::Delete(name) => {
                if store_result(events, query::delete_ingredient(book, &name)).is_some() {
                    events.push(UpdateEvent::Changed);
                }
            }
            Action::Add => {
                let ingredient = match self.new_ingredient.parse() {
                    Ok(ingredient) => ingredient,
                    Err(errors) => {
                        events.extend(errors.iter().map(|e| UpdateEvent::Invalid(e.to_string())));
                        return;
                    }
                };
                if store_result(events, query::add_ingredient(book, &ingredient)).is_some() {
                    self.new_ingredient = Default::default();
                    events.push(UpdateEvent::Changed);
                }
            }
        }
    }

    pub fn update(&mut self, ctx: &egui::Context, book: &mut Workbook) -> Vec<UpdateEvent> {
        let mut open = true;
        let mut events = vec![];
        let mut actions = vec![];

        egui::Window::new("Ingredients")
            .open(&mut open)
            .show(ctx, |ui| {
                let scroll_height = ui.available_height() - 35.0;
                egui::ScrollArea::vertical()
                    .auto_shrink(false)
                    .max_height(scroll_height)
                    .show(ui, |ui| {
                        egui::Grid::new("ingredient list grid")
                            .striped(true)
                            .show(ui, |ui| {
                                ui.label("Name");
                                nutrients_header(ui);
                                ui.label("Unit");
                                ui.end_row();
                                ui.weak("");
                                ui.weak("per 100");
                                ui.end_row();

                                for (i, ingredient) in self.ingredients.iter().enumerate() {
                                    if let Some((name, form)) = &mut self.being_edited {
                                        if *name == ingredient.name {
                                            form.show(ui);
                                            if ui.button("Save").clicked() {
                                                actions.push(Action::SaveEdit);
                                            }
                                            if ui.button("Cancel").clicked() {
                                                actions.push(Action::CancelEdit);
                                            }
                                            ui.end_row();
                                            continue;
                                        }
                                    }

                                    ui.label(&ingredient.name);
                                    nutrients_row(ui, &ingredient.per_100);
                                    ui.label(&ingredient.unit);
                                    if self.edit_mode && self.being_edited.is_none() {
                                        if ui.button("Edit").clicked() {
                                            actions.push(Action::Edit(i));
                                        }
                                        if ui.button("Delete").clicked() {
                                            actions.push(Action::Delete(ingredient.name.clone()));
                                        }
                                    }
                                    ui.end_row();
                                }

                                if self.edit_mode {
                                    self.new_ingredient.show(ui);
                                    if ui.button("Add").clicked() {
                                        actions.push(Action::Add);
                                    }
                                    ui.end_row();
                                }
                            });
                        if self.unreadable > 0 {
                            ui.weak(format!("{} unreadable ingredient rows", self.unreadable));
                        }
                    });
                ui.separator();
                ui.horizontal(|ui| {
                    ui.toggle_value(&mut self.edit_mode, "Edit");
                    if !self.edit_mode {
                        self.being_edited = None;
                    }
                });
            });

        for action in actions {
            self.perform(action, book, &mut events);
        }
        if !open {
            events.push(UpdateEvent::Closed);
        }
        events
    }
}

#[test]
fn ingredient_form_reports_every_bad_field() {
    let form = IngredientForm {
        name: "".into(),
        calories: "lots".into(),
        fat: "".into(),
        ..Default::default()
    };
    let errors = form.parse().unwrap_err();
    let columns: Vec<_> = errors.iter().map(|e| e.column).collect();
    assert_eq!(columns, vec![CALORIES_PER_100, FAT_PER_100, INGREDIENT_NAME]);
}

#[test]
fn ingredient_form_parses_valid_fields() {
    let form = IngredientForm {
        name: "oats".into(),
        calories: " 380 ".into(),
        ..Default::default()
    };
    let ingredient = form.parse().unwrap();
    assert_eq!(ingredient.name, "oats");
    assert_eq!(ingredient.per_100.calories, 380.0);
}
