use eframe::egui;

pub struct AboutWindow {}

impl AboutWindow {
    pub fn new() -> Self {
        Self {}
    }

    /// Returns true once the window has been closed.
    pub fn update(&mut self, ctx: &egui::Context) -> bool {
        let mut open = true;

        egui::Window::new("About")
            .resizable([false, false])
            .open(&mut open)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("Meal Planner");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.label("Recipes, ingredients and daily meal plans with nutrition totals.");
                });
            });

        !open
    }
}
