use super::{nutrients_header, nutrients_row, store_result, UpdateEvent};
use crate::database::{self, Workbook};
use crate::nutrition::Aggregate;
use crate::query;
use crate::records::{
    parse_number, FieldError, MealKey, MealPlanEntry, MealType, Recipe, PORTION_SIZE,
};
use eframe::egui;

struct MealForm {
    meal_type: MealType,
    recipe: String,
    portion_size: String,
}

impl Default for MealForm {
    fn default() -> Self {
        Self {
            meal_type: MealType::Breakfast,
            recipe: String::new(),
            portion_size: "1".into(),
        }
    }
}

impl MealForm {
    fn new(entry: &MealPlanEntry) -> Self {
        Self {
            meal_type: entry.meal_type,
            recipe: entry.recipe.clone(),
            portion_size: entry.portion_size.to_string(),
        }
    }

    fn parse(&self, date: chrono::NaiveDate) -> Result<MealPlanEntry, FieldError> {
        let portion_size = parse_number(PORTION_SIZE, &self.portion_size)?;
        MealPlanEntry::new(date, self.meal_type, &self.recipe, portion_size)
    }

    fn show(&mut self, ui: &mut egui::Ui, id_salt: &str, recipe_names: &[String]) {
        egui::ComboBox::from_id_salt((id_salt, "meal type"))
            .selected_text(self.meal_type.to_string())
            .show_ui(ui, |ui| {
                for meal_type in MealType::iter() {
                    ui.selectable_value(&mut self.meal_type, meal_type, meal_type.to_string());
                }
            });
        egui::ComboBox::from_id_salt((id_salt, "meal recipe"))
            .selected_text(self.recipe.as_str())
            .show_ui(ui, |ui| {
                for name in recipe_names {
                    ui.selectable_value(&mut self.recipe, name.clone(), name);
                }
            });
        ui.add(egui::TextEdit::singleline(&mut self.portion_size).desired_width(40.0));
    }
}

enum Action {
    Edit(usize),
    Delete(MealKey),
    SaveEdit,
    CancelEdit,
    Add,
    OpenRecipe(String),
}

pub struct MealPlanWindow {
    date: chrono::NaiveDate,
    meals: Vec<MealPlanEntry>,
    unreadable: usize,
    totals: Aggregate,
    recipe_names: Vec<String>,
    edit_mode: bool,
    new_meal: MealForm,
    being_edited: Option<(MealKey, MealForm)>,
}

impl MealPlanWindow {
    pub fn new(
        book: &mut Workbook,
        date: chrono::NaiveDate,
        edit_mode: bool,
    ) -> database::Result<Self> {
        let listing = query::meals_on(book, date)?;
        let unreadable = listing.malformed.len();
        let mut meals = listing.into_records();
        meals.sort_by(|a, b| (a.meal_type, &a.recipe).cmp(&(b.meal_type, &b.recipe)));

        let totals = query::daily_totals(book, date)?;

        let mut recipe_names: Vec<String> = query::list_all::<Recipe>(book)?
            .into_records()
            .into_iter()
            .map(|r| r.name)
            .collect();
        recipe_names.sort();

        Ok(Self {
            date,
            meals,
            unreadable,
            totals,
            recipe_names,
            edit_mode,
            new_meal: Default::default(),
            being_edited: None,
        })
    }

    /// Reloads the day, keeping whatever is being typed.
    pub fn refresh(&mut self, book: &mut Workbook) -> database::Result<()> {
        let fresh = Self::new(book, self.date, self.edit_mode)?;
        self.meals = fresh.meals;
        self.unreadable = fresh.unreadable;
        self.totals = fresh.totals;
        self.recipe_names = fresh.recipe_names;
        Ok(())
    }

    fn change_date(
        &mut self,
        book: &mut Workbook,
        date: chrono::NaiveDate,
    ) -> database::Result<()> {
        self.date = date;
        self.being_edited = None;
        self.refresh(book)
    }

    fn perform(&mut self, action: Action, book: &mut Workbook, events: &mut Vec<UpdateEvent>) {
        match action {
            Action::Edit(i) => {
                if let Some(meal) = self.meals.get(i) {
                    self.being_edited = Some((meal.key(), MealForm::new(meal)));
                }
            }
            Action::CancelEdit => self.being_edited = None,
            Action::SaveEdit => {
                let Some((key, form)) = &self.being_edited else {
                    return;
                };
                let entry = match form.parse(self.date) {
                    Ok(entry) => entry,
                    Err(error) => {
                        events.push(UpdateEvent::Invalid(error.to_string()));
                        return;
                    }
                };
                if store_result(events, query::replace_meal(book, key, &entry)).is_some() {
                    self.being_edited = None;
                    events.push(UpdateEvent::Changed);
                }
            }
            Action::Delete(key) => {
                if store_result(events, query::delete_meal(book, &key)).is_some() {
                    events.push(UpdateEvent::Changed);
                }
            }
            Action::Add => {
                let entry = match self.new_meal.parse(self.date) {
                    Ok(entry) => entry,
                    Err(error) => {
                        events.push(UpdateEvent::Invalid(error.to_string()));
                        return;
                    }
                };
                if store_result(events, query::add_meal(book, &entry)).is_some() {
                    self.new_meal = Default::default();
                    events.push(UpdateEvent::Changed);
                }
            }
            Action::OpenRecipe(name) => events.push(UpdateEvent::OpenRecipe(name)),
        }
    }

    fn update_meals(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        egui::Grid::new("meal plan grid").striped(true).show(ui, |ui| {
            ui.label("Meal");
            ui.label("Recipe");
            ui.label("Portion");
            ui.end_row();

            for (i, meal) in self.meals.iter().enumerate() {
                if let Some((key, form)) = &mut self.being_edited {
                    if *key == meal.key() {
                        form.show(ui, "edited meal", &self.recipe_names);
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

                ui.label(meal.meal_type.to_string());
                if ui.link(&meal.recipe).clicked() {
                    actions.push(Action::OpenRecipe(meal.recipe.clone()));
                }
                ui.label(meal.portion_size.to_string());
                if self.edit_mode && self.being_edited.is_none() {
                    if ui.button("Edit").clicked() {
                        actions.push(Action::Edit(i));
                    }
                    if ui.button("Delete").clicked() {
                        actions.push(Action::Delete(meal.key()));
                    }
                }
                ui.end_row();
            }

            if self.edit_mode {
                self.new_meal.show(ui, "new meal", &self.recipe_names);
                if ui.button("Add").clicked() {
                    actions.push(Action::Add);
                }
                ui.end_row();
            }
        });
        if self.unreadable > 0 {
            ui.weak(format!("{} unreadable meal rows", self.unreadable));
        }
    }

    fn update_totals(&self, ui: &mut egui::Ui) {
        egui::Grid::new("meal plan totals").show(ui, |ui| {
            ui.label("");
            nutrients_header(ui);
            ui.end_row();
            ui.label("Day total");
            nutrients_row(ui, &self.totals.totals.rounded());
            ui.end_row();
        });
        for skipped in &self.totals.skipped {
            ui.colored_label(ui.visuals().warn_fg_color, skipped.to_string());
        }
    }

    pub fn update(&mut self, ctx: &egui::Context, book: &mut Workbook) -> Vec<UpdateEvent> {
        let mut open = true;
        let mut events = vec![];
        let mut actions = vec![];
        let mut new_date = None;

        egui::Window::new("Meal Plan")
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("<").clicked() {
                        new_date = self.date.pred_opt();
                    }
                    let mut date = self.date;
                    ui.add(egui_extras::DatePickerButton::new(&mut date));
                    if date != self.date {
                        new_date = Some(date);
                    }
                    if ui.button(">").clicked() {
                        new_date = self.date.succ_opt();
                    }
                    ui.label(self.date.format("%A").to_string());
                });
                ui.separator();
                self.update_meals(ui, &mut actions);
                ui.separator();
                self.update_totals(ui);
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
        if let Some(date) = new_date {
            if let Err(error) = self.change_date(book, date) {
                events.push(UpdateEvent::Failed(error));
            }
        }
        if !open {
            events.push(UpdateEvent::Closed);
        }
        events
    }
}
