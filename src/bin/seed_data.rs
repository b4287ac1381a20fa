//! Seed data script - populates the catalog with a small demo menu
//!
//! Run with: cargo run --bin seed-data -- --migrate
//!
//! This creates:
//! - 3 recipe categories
//! - 10 ingredients with nutrition facts
//! - 4 recipes (one seasonal) with their ingredient rows

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectOptions, Database};
use tracing::info;
use uuid::Uuid;

use mealkit_api::{
    db,
    entities::commerce::{Difficulty, IngredientModel, MeasurementUnit},
    errors::ServiceError,
    services::commerce::{
        AddRecipeIngredientInput, CatalogService, CreateCategoryInput, CreateIngredientInput,
        CreateRecipeInput,
    },
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Populate the meal-kit catalog with demo recipes")]
struct Args {
    /// Database to seed
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://mealkit.db?mode=rwc")]
    database_url: String,

    /// Run migrations before seeding
    #[arg(long)]
    migrate: bool,
}

struct IngredientSeed {
    name: &'static str,
    unit: MeasurementUnit,
    price_per_unit: Decimal,
    calories: Decimal,
    protein_g: Decimal,
    fat_g: Decimal,
    carbs_g: Decimal,
}

const INGREDIENTS: &[IngredientSeed] = &[
    IngredientSeed { name: "Chicken Breast", unit: MeasurementUnit::Kg, price_per_unit: dec!(280), calories: dec!(1650), protein_g: dec!(310), fat_g: dec!(36), carbs_g: dec!(0) },
    IngredientSeed { name: "Butter", unit: MeasurementUnit::Kg, price_per_unit: dec!(520), calories: dec!(7170), protein_g: dec!(9), fat_g: dec!(810), carbs_g: dec!(1) },
    IngredientSeed { name: "Cream", unit: MeasurementUnit::L, price_per_unit: dec!(310), calories: dec!(3400), protein_g: dec!(21), fat_g: dec!(360), carbs_g: dec!(28) },
    IngredientSeed { name: "Tomatoes", unit: MeasurementUnit::Kg, price_per_unit: dec!(60), calories: dec!(180), protein_g: dec!(9), fat_g: dec!(2), carbs_g: dec!(39) },
    IngredientSeed { name: "Chickpeas", unit: MeasurementUnit::Kg, price_per_unit: dec!(120), calories: dec!(1640), protein_g: dec!(89), fat_g: dec!(26), carbs_g: dec!(274) },
    IngredientSeed { name: "Basmati Rice", unit: MeasurementUnit::Kg, price_per_unit: dec!(140), calories: dec!(3600), protein_g: dec!(70), fat_g: dec!(6), carbs_g: dec!(790) },
    IngredientSeed { name: "Paneer", unit: MeasurementUnit::Kg, price_per_unit: dec!(400), calories: dec!(2650), protein_g: dec!(183), fat_g: dec!(208), carbs_g: dec!(12) },
    IngredientSeed { name: "Spinach", unit: MeasurementUnit::Kg, price_per_unit: dec!(80), calories: dec!(230), protein_g: dec!(29), fat_g: dec!(4), carbs_g: dec!(36) },
    IngredientSeed { name: "Mango", unit: MeasurementUnit::Piece, price_per_unit: dec!(45), calories: dec!(200), protein_g: dec!(3), fat_g: dec!(1), carbs_g: dec!(50) },
    IngredientSeed { name: "Garam Masala", unit: MeasurementUnit::Tsp, price_per_unit: dec!(4), calories: dec!(6), protein_g: dec!(0.2), fat_g: dec!(0.3), carbs_g: dec!(1) },
];

struct RecipeSeed {
    name: &'static str,
    category: usize,
    difficulty: Difficulty,
    prep: i32,
    cook: i32,
    default_servings: i32,
    min_servings: i32,
    max_servings: i32,
    base_price: Decimal,
    seasonal: bool,
    lines: &'static [(&'static str, Decimal, bool)],
}

const CATEGORIES: &[&str] = &["Curries", "Vegetarian", "Summer Specials"];

const RECIPES: &[RecipeSeed] = &[
    RecipeSeed {
        name: "Butter Chicken",
        category: 0,
        difficulty: Difficulty::Medium,
        prep: 20,
        cook: 35,
        default_servings: 4,
        min_servings: 1,
        max_servings: 12,
        base_price: dec!(299),
        seasonal: false,
        lines: &[("Chicken Breast", dec!(0.8), false)],
    },
    RecipeSeed {
        name: "Chana Masala",
        category: 0,
        difficulty: Difficulty::Easy,
        prep: 15,
        cook: 30,
        default_servings: 2,
        min_servings: 1,
        max_servings: 8,
        base_price: dec!(149),
        seasonal: false,
        lines: &[
            ("Chickpeas", dec!(0.4), false),
            ("Tomatoes", dec!(0.3), false),
            ("Cream", dec!(0.2), true),
            ("Garam Masala", dec!(2), true),
        ],
    },
    RecipeSeed {
        name: "Palak Paneer",
        category: 1,
        difficulty: Difficulty::Medium,
        prep: 15,
        cook: 25,
        default_servings: 2,
        min_servings: 2,
        max_servings: 6,
        base_price: dec!(189),
        seasonal: false,
        lines: &[
            ("Paneer", dec!(0.25), false),
            ("Spinach", dec!(0.5), false),
            ("Butter", dec!(0.03), true),
            ("Basmati Rice", dec!(0.2), true),
        ],
    },
    RecipeSeed {
        name: "Mango Lassi Kit",
        category: 2,
        difficulty: Difficulty::Easy,
        prep: 10,
        cook: 0,
        default_servings: 2,
        min_servings: 1,
        max_servings: 4,
        base_price: dec!(99),
        seasonal: true,
        lines: &[("Mango", dec!(2), false)],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    info!("=== Meal-kit Seed Data ===");

    let mut options = ConnectOptions::new(args.database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10));

    info!("Connecting to database: {}", args.database_url);
    let conn = Database::connect(options).await?;
    if args.migrate {
        db::run_migrations(&conn).await?;
    }

    let catalog = CatalogService::new(Arc::new(conn));

    info!("Creating categories...");
    let mut category_ids = Vec::with_capacity(CATEGORIES.len());
    for name in CATEGORIES {
        let category = catalog
            .create_category(CreateCategoryInput {
                name: name.to_string(),
                slug: None,
                description: None,
            })
            .await?;
        category_ids.push(category.id);
    }
    info!("  Created {} categories", category_ids.len());

    info!("Creating ingredients...");
    let mut ingredients = Vec::with_capacity(INGREDIENTS.len());
    for seed in INGREDIENTS {
        let ingredient = catalog
            .create_ingredient(CreateIngredientInput {
                name: seed.name.to_string(),
                description: None,
                default_unit: seed.unit,
                price_per_unit: seed.price_per_unit,
                calories: seed.calories,
                protein_g: seed.protein_g,
                fat_g: seed.fat_g,
                carbs_g: seed.carbs_g,
                is_available: true,
            })
            .await?;
        ingredients.push(ingredient);
    }
    info!("  Created {} ingredients", ingredients.len());

    info!("Creating recipes...");
    let year = Utc::now().date_naive().year();
    for seed in RECIPES {
        let (available_from, available_until) = if seed.seasonal {
            (
                NaiveDate::from_ymd_opt(year, 4, 1),
                NaiveDate::from_ymd_opt(year, 7, 31),
            )
        } else {
            (None, None)
        };

        let recipe = catalog
            .create_recipe(CreateRecipeInput {
                name: seed.name.to_string(),
                slug: None,
                category_id: category_ids.get(seed.category).copied(),
                description: format!("{} from the demo menu", seed.name),
                instructions: String::new(),
                difficulty: seed.difficulty,
                prep_time_minutes: seed.prep,
                cook_time_minutes: seed.cook,
                default_servings: seed.default_servings,
                min_servings: seed.min_servings,
                max_servings: seed.max_servings,
                base_price: seed.base_price,
                is_published: true,
                is_seasonal: seed.seasonal,
                available_from,
                available_until,
            })
            .await?;

        for (name, quantity, optional) in seed.lines {
            catalog
                .add_recipe_ingredient(
                    recipe.id,
                    AddRecipeIngredientInput {
                        ingredient_id: ingredient_id(&ingredients, name)?,
                        quantity: *quantity,
                        is_optional: *optional,
                        notes: None,
                    },
                )
                .await?;
        }
        info!("  {} ({} ingredients)", recipe.slug, seed.lines.len());
    }

    info!("=== Seed Data Complete ===");
    info!("Try: curl http://localhost:8080/api/v1/recipes");
    info!("     curl http://localhost:8080/api/v1/recipes/butter-chicken?servings=8");

    Ok(())
}

fn ingredient_id(ingredients: &[IngredientModel], name: &str) -> Result<Uuid, ServiceError> {
    ingredients
        .iter()
        .find(|ingredient| ingredient.name == name)
        .map(|ingredient| ingredient.id)
        .ok_or_else(|| ServiceError::NotFound(format!("Ingredient {} not seeded", name)))
}
