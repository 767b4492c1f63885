use super::{nutrients_header, nutrients_row, store_result, UpdateEvent};
use crate::database::{self, Workbook};
use crate::query;
use crate::records::{parse_number, Recipe, SERVINGS};
use eframe::egui;

pub struct RecipeListWindow {
    recipes: Vec<Recipe>,
    unreadable: usize,
    edit_mode: bool,
    new_recipe_name: String,
    new_recipe_servings: String,
}

impl RecipeListWindow {
    pub fn new(book: &mut Workbook, edit_mode: bool) -> database::Result<Self> {
        let listing = query::list_all::<Recipe>(book)?;
        let unreadable = listing.malformed.len();
        let mut recipes = listing.into_records();
        recipes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            recipes,
            unreadable,
            edit_mode,
            new_recipe_name: String::new(),
            new_recipe_servings: "1".into(),
        })
    }

    pub fn refresh(&mut self, book: &mut Workbook) -> database::Result<()> {
        let new_recipe_name = std::mem::take(&mut self.new_recipe_name);
        *self = Self {
            new_recipe_name,
            ..Self::new(book, self.edit_mode)?
        };
        Ok(())
    }

    fn add_recipe(&mut self, book: &mut Workbook, events: &mut Vec<UpdateEvent>) {
        let recipe = parse_number(SERVINGS, &self.new_recipe_servings)
            .and_then(|servings| Recipe::new(&self.new_recipe_name, "", "", servings));
        let recipe = match recipe {
            Ok(recipe) => recipe,
            Err(error) => {
                events.push(UpdateEvent::Invalid(error.to_string()));
                return;
            }
        };
        if store_result(events, query::add_recipe(book, &recipe)).is_some() {
            self.new_recipe_name.clear();
            events.push(UpdateEvent::Changed);
            events.push(UpdateEvent::OpenRecipe(recipe.name));
        }
    }

    pub fn update(&mut self, ctx: &egui::Context, book: &mut Workbook) -> Vec<UpdateEvent> {
        let mut open = true;
        let mut events = vec![];
        let mut to_delete = None;
        let mut add = false;

        egui::Window::new("Recipes")
            .open(&mut open)
            .show(ctx, |ui| {
                let scroll_height = ui.available_height() - 35.0;
                egui::ScrollArea::vertical()
                    .auto_shrink(false)
                    .max_height(scroll_height)
                    .show(ui, |ui| {
                        egui::Grid::new("recipe list grid")
                            .striped(true)
                            .show(ui, |ui| {
                                ui.label("Name");
                                nutrients_header(ui);
                                ui.label("Servings");
                                ui.end_row();

                                for recipe in &self.recipes {
                                    if ui.link(&recipe.name).clicked() {
                                        events.push(UpdateEvent::OpenRecipe(recipe.name.clone()));
                                    }
                                    nutrients_row(ui, &recipe.totals);
                                    ui.label(recipe.servings.to_string());
                                    if self.edit_mode && ui.button("Delete").clicked() {
                                        to_delete = Some(recipe.name.clone());
                                    }
                                    ui.end_row();
                                }
                            });
                        if self.unreadable > 0 {
                            ui.weak(format!("{} unreadable recipe rows", self.unreadable));
                        }
                    });
                ui.separator();
                ui.horizontal(|ui| {
                    ui.toggle_value(&mut self.edit_mode, "Edit");
                    if self.edit_mode {
                        ui.label("Name:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.new_recipe_name)
                                .desired_width(ui.available_width() - 200.0),
                        );
                        ui.label("Servings:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.new_recipe_servings)
                                .desired_width(40.0),
                        );
                        if ui.button("Add").clicked() {
                            add = true;
                        }
                    }
                });
            });

        if let Some(name) = to_delete {
            if store_result(&mut events, query::delete_recipe(book, &name)).is_some() {
                events.push(UpdateEvent::RecipeDeleted(name));
                events.push(UpdateEvent::Changed);
            }
        }
        if add {
            self.add_recipe(book, &mut events);
        }
        if !open {
            events.push(UpdateEvent::Closed);
        }
        events
    }
}
