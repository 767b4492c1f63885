// Copyright 2023 Remi Bernotavicius

use crate::database::{self, StoreError, Workbook};
use crate::nutrition::{Nutrients, Skipped};
use about::AboutWindow;
use eframe::egui;
use ingredient_list::IngredientListWindow;
use meal_plan::MealPlanWindow;
use recipe::RecipeWindow;
use recipe_list::RecipeListWindow;
use std::collections::HashMap;
use std::mem;
use thousands::Separable as _;

mod about;
mod ingredient_list;
mod meal_plan;
mod recipe;
mod recipe_list;

fn new_toast(text: impl Into<egui::WidgetText>, kind: egui_toast::ToastKind) -> egui_toast::Toast {
    egui_toast::Toast {
        kind,
        text: text.into(),
        options: egui_toast::ToastOptions::default()
            .duration_in_seconds(5.0)
            .show_progress(true),
        style: Default::default(),
    }
}

pub fn new_error_toast(text: impl Into<egui::WidgetText>) -> egui_toast::Toast {
    new_toast(text, egui_toast::ToastKind::Error)
}

pub fn new_warning_toast(text: impl Into<egui::WidgetText>) -> egui_toast::Toast {
    new_toast(text, egui_toast::ToastKind::Warning)
}

pub fn new_info_toast(text: impl Into<egui::WidgetText>) -> egui_toast::Toast {
    new_toast(text, egui_toast::ToastKind::Info)
}

/// Things a window needs the rest of the application to react to.
pub enum UpdateEvent {
    Closed,
    /// Something was written to the workbook; list windows should reload.
    Changed,
    OpenRecipe(String),
    RecipeDeleted(String),
    Saved(String),
    Invalid(String),
    Skipped(Vec<Skipped>),
    Failed(StoreError),
}

/// Unwraps a store result, turning a failure into an event.
fn store_result<T>(events: &mut Vec<UpdateEvent>, result: database::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            events.push(UpdateEvent::Failed(error));
            None
        }
    }
}

fn nutrients_header(ui: &mut egui::Ui) {
    ui.label("Calories");
    ui.label("Protein (g)");
    ui.label("Carbs (g)");
    ui.label("Fat (g)");
}

fn nutrients_row(ui: &mut egui::Ui, nutrients: &Nutrients) {
    ui.label(format!("{:.2}", nutrients.calories).separate_with_commas());
    ui.label(format!("{:.2}", nutrients.protein));
    ui.label(format!("{:.2}", nutrients.carbs));
    ui.label(format!("{:.2}", nutrients.fat));
}

fn toggled_visuals(current: &egui::Visuals) -> egui::Visuals {
    if current.dark_mode {
        egui::Visuals::light()
    } else {
        egui::Visuals::dark()
    }
}

fn is_closed(events: &[UpdateEvent]) -> bool {
    events.iter().any(|e| matches!(e, UpdateEvent::Closed))
}

pub struct MealPlanner {
    book: Workbook,
    toasts: egui_toast::Toasts,
    fatal: Option<StoreError>,
    recipe_list: Option<RecipeListWindow>,
    recipes: HashMap<String, RecipeWindow>,
    ingredient_list: Option<IngredientListWindow>,
    meal_plan: Option<MealPlanWindow>,
    about: Option<AboutWindow>,
}

impl MealPlanner {
    pub fn new(book: Workbook) -> Self {
        let mut planner = Self {
            book,
            toasts: egui_toast::Toasts::new()
                .anchor(egui::Align2::RIGHT_BOTTOM, (-10.0, -10.0))
                .direction(egui::Direction::BottomUp),
            fatal: None,
            recipe_list: None,
            recipes: Default::default(),
            ingredient_list: None,
            meal_plan: None,
            about: None,
        };
        planner.open_meal_plan();
        planner
    }

    fn fail(&mut self, error: StoreError) {
        log::error!("{error}");
        if error.is_fatal() {
            if self.fatal.is_none() {
                self.fatal = Some(error);
            }
        } else {
            self.toasts.add(new_error_toast(error.to_string()));
        }
    }

    fn open_recipe_list(&mut self) {
        match RecipeListWindow::new(&mut self.book, false) {
            Ok(window) => self.recipe_list = Some(window),
            Err(error) => self.fail(error),
        }
    }

    fn open_ingredient_list(&mut self) {
        match IngredientListWindow::new(&mut self.book, false) {
            Ok(window) => self.ingredient_list = Some(window),
            Err(error) => self.fail(error),
        }
    }

    fn open_meal_plan(&mut self) {
        let today = chrono::Local::now().date_naive();
        match MealPlanWindow::new(&mut self.book, today, false) {
            Ok(window) => self.meal_plan = Some(window),
            Err(error) => self.fail(error),
        }
    }

    fn open_recipe(&mut self, name: String) {
        if self.recipes.contains_key(&name) {
            return;
        }
        match RecipeWindow::new(&mut self.book, &name, false) {
            Ok(window) => {
                self.recipes.insert(name, window);
            }
            Err(error) => self.fail(error),
        }
    }

    fn refresh_all(&mut self) {
        let mut errors = vec![];
        if let Some(window) = &mut self.recipe_list {
            errors.extend(window.refresh(&mut self.book).err());
        }
        if let Some(window) = &mut self.ingredient_list {
            errors.extend(window.refresh(&mut self.book).err());
        }
        if let Some(window) = &mut self.meal_plan {
            errors.extend(window.refresh(&mut self.book).err());
        }

        let mut gone = vec![];
        let mut warnings = vec![];
        for (name, window) in &mut self.recipes {
            match window.refresh(&mut self.book) {
                Ok(missing) => warnings.extend(
                    missing
                        .into_iter()
                        .map(|i| format!("{name} uses {i:?}, which no longer exists")),
                ),
                Err(StoreError::NoSuchRecord { .. }) => gone.push(name.clone()),
                Err(error) => errors.push(error),
            }
        }
        for name in gone {
            self.recipes.remove(&name);
        }
        for warning in warnings {
            self.toasts.add(new_warning_toast(warning));
        }

        for error in errors {
            self.fail(error);
        }
    }

    fn handle_event(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::Closed => {}
            UpdateEvent::Changed => self.refresh_all(),
            UpdateEvent::OpenRecipe(name) => self.open_recipe(name),
            UpdateEvent::RecipeDeleted(name) => {
                self.recipes.remove(&name);
            }
            UpdateEvent::Saved(message) => {
                self.toasts.add(new_info_toast(message));
            }
            UpdateEvent::Invalid(message) => {
                self.toasts.add(new_error_toast(message));
            }
            UpdateEvent::Skipped(skipped) => {
                for s in skipped {
                    self.toasts.add(new_warning_toast(s.to_string()));
                }
            }
            UpdateEvent::Failed(error) => self.fail(error),
        }
    }

    fn update_menu(&mut self, ctx: &egui::Context) {
        let mut open_recipes = false;
        let mut open_ingredients = false;
        let mut open_meal_plan = false;
        let mut refresh = false;
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Refresh").clicked() {
                        refresh = true;
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.button("Recipes").clicked() {
                        open_recipes = true;
                        ui.close_menu();
                    }
                    if ui.button("Ingredients").clicked() {
                        open_ingredients = true;
                        ui.close_menu();
                    }
                    if ui.button("Meal Plan").clicked() {
                        open_meal_plan = true;
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Toggle Theme").clicked() {
                        ctx.set_visuals(toggled_visuals(&ctx.style().visuals));
                        ui.close_menu();
                    }
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() && self.about.is_none() {
                        self.about = Some(AboutWindow::new());
                        ui.close_menu();
                    }
                });
            });
        });

        if open_recipes && self.recipe_list.is_none() {
            self.open_recipe_list();
        }
        if open_ingredients && self.ingredient_list.is_none() {
            self.open_ingredient_list();
        }
        if open_meal_plan && self.meal_plan.is_none() {
            self.open_meal_plan();
        }
        if refresh {
            self.refresh_all();
        }
    }

    fn update_recipe_list_window(&mut self, ctx: &egui::Context) -> Vec<UpdateEvent> {
        let Some(window) = &mut self.recipe_list else {
            return vec![];
        };
        let events = window.update(ctx, &mut self.book);
        if is_closed(&events) {
            self.recipe_list = None;
        }
        events
    }

    fn update_ingredient_list_window(&mut self, ctx: &egui::Context) -> Vec<UpdateEvent> {
        let Some(window) = &mut self.ingredient_list else {
            return vec![];
        };
        let events = window.update(ctx, &mut self.book);
        if is_closed(&events) {
            self.ingredient_list = None;
        }
        events
    }

    fn update_meal_plan_window(&mut self, ctx: &egui::Context) -> Vec<UpdateEvent> {
        let Some(window) = &mut self.meal_plan else {
            return vec![];
        };
        let events = window.update(ctx, &mut self.book);
        if is_closed(&events) {
            self.meal_plan = None;
        }
        events
    }

    fn update_recipes(&mut self, ctx: &egui::Context) -> Vec<UpdateEvent> {
        let mut events = vec![];
        for (_, mut recipe) in mem::take(&mut self.recipes) {
            let recipe_events = recipe.update(ctx, &mut self.book);
            if !is_closed(&recipe_events) {
                // The recipe may have been renamed.
                self.recipes.insert(recipe.name().to_owned(), recipe);
            }
            events.extend(recipe_events);
        }
        events
    }

    fn update_about_window(&mut self, ctx: &egui::Context) {
        if let Some(window) = &mut self.about {
            if window.update(ctx) {
                self.about = None;
            }
        }
    }

    fn update_fatal_window(&self, ctx: &egui::Context, error: &StoreError) {
        egui::Window::new("Workbook unavailable")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(error.to_string());
                ui.label("Check the workbook path and permissions, then restart.");
                if ui.button("Quit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
    }
}

impl eframe::App for MealPlanner {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(error) = self.fatal.take() {
            self.update_fatal_window(ctx, &error);
            self.fatal = Some(error);
            self.toasts.show(ctx);
            return;
        }

        self.update_menu(ctx);
        self.update_about_window(ctx);

        let mut events = vec![];
        events.extend(self.update_recipe_list_window(ctx));
        events.extend(self.update_ingredient_list_window(ctx));
        events.extend(self.update_meal_plan_window(ctx));
        events.extend(self.update_recipes(ctx));
        for event in events {
            self.handle_event(event);
        }

        self.toasts.show(ctx);
    }
}

#[test]
fn toggling_theme_switches_between_light_and_dark() {
    let light = toggled_visuals(&egui::Visuals::dark());
    assert!(!light.dark_mode);
    assert!(toggled_visuals(&light).dark_mode);
}
