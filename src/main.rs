// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use database::Workbook;
use records::Record as _;
use std::path::PathBuf;
use thousands::Separable as _;

mod config;
mod database;
mod nutrition;
mod query;
mod records;
mod ui;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
struct Args {
    /// Workbook to use instead of the configured one.
    #[arg(long)]
    workbook: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open the meal planner window.
    Run,
    /// Write any missing header rows and show how many rows each collection has.
    Init,
    /// List recipes and their nutrition totals.
    Recipes,
    /// Recompute a recipe's totals from its ingredients.
    Recompute { recipe: String },
    /// Show the meals planned for a day and what they add up to.
    Day { date: chrono::NaiveDate },
}

fn run(book: Workbook) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1100.0, 700.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Meal Planner",
        native_options,
        Box::new(|_cc| Ok(Box::new(ui::MealPlanner::new(book)))),
    )
    .map_err(|e| e.to_string())?;

    Ok(())
}

fn print_nutrients(label: &str, n: &nutrition::Nutrients) {
    println!(
        "{label:<30} {:>10} kcal {:>8.2} g protein {:>8.2} g carbs {:>8.2} g fat",
        format!("{:.2}", n.calories).separate_with_commas(),
        n.protein,
        n.carbs,
        n.fat
    );
}

fn print_skipped(aggregate: &nutrition::Aggregate) {
    for skipped in &aggregate.skipped {
        println!("warning: {skipped}");
    }
}

fn summarize(book: &mut Workbook) -> Result<()> {
    for collection in database::models::Collection::iter() {
        let rows = book.row_count(collection)?;
        println!("{collection}: {} rows", rows.saturating_sub(1));
    }
    Ok(())
}

fn list_recipes(book: &mut Workbook) -> Result<()> {
    let listing = query::list_all::<records::Recipe>(book)?;
    for p in &listing.records {
        print_nutrients(&p.record.name, &p.record.totals);
    }
    for m in &listing.malformed {
        println!(
            "warning: {} row {} is unreadable: {}",
            records::Recipe::COLLECTION,
            m.position,
            m.error
        );
    }
    Ok(())
}

fn recompute(book: &mut Workbook, recipe: &str) -> Result<()> {
    let aggregate = query::recompute_recipe(book, recipe)?;
    print_nutrients(recipe, &aggregate.totals);
    print_skipped(&aggregate);
    Ok(())
}

fn show_day(book: &mut Workbook, date: chrono::NaiveDate) -> Result<()> {
    let mut meals = query::meals_on(book, date)?.into_records();
    meals.sort_by_key(|m| m.meal_type);
    for meal in &meals {
        println!(
            "{:<10} {} x{}",
            meal.meal_type.to_string(),
            meal.recipe,
            meal.portion_size
        );
    }
    let aggregate = query::daily_totals(book, date)?;
    print_nutrients(&format!("total for {date}"), &aggregate.totals);
    print_skipped(&aggregate);
    Ok(())
}

fn init_logging(config: &config::Config) -> Result<()> {
    let logger = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env();
    let logger = match config.log_level()? {
        Some(level) => logger.with_level(level),
        None => logger,
    };
    logger.init()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let config = config::Config::load(config_path)?;
    init_logging(&config)?;

    let workbook_path = match args.workbook {
        Some(path) => path,
        None => config.workbook_path()?,
    };
    let mut book = query::open_workbook(workbook_path)?;
    match args.commands {
        Commands::Run => return run(book),
        Commands::Init => summarize(&mut book)?,
        Commands::Recipes => list_recipes(&mut book)?,
        Commands::Recompute { recipe } => recompute(&mut book, &recipe)?,
        Commands::Day { date } => show_day(&mut book, date)?,
    }
    book.close();
    Ok(())
}
