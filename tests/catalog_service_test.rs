mod common;

use assert_matches::assert_matches;
use common::TestApp;
use mealkit_api::{
    entities::commerce::{Difficulty, Ingredient, MeasurementUnit, RecipeIngredient},
    errors::ServiceError,
    services::commerce::{CreateIngredientInput, CreateRecipeInput, RecipeListQuery},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

fn ingredient(name: &str, price_per_unit: Decimal) -> CreateIngredientInput {
    CreateIngredientInput {
        name: name.to_string(),
        description: None,
        default_unit: MeasurementUnit::Kg,
        price_per_unit,
        calories: Decimal::ZERO,
        protein_g: Decimal::ZERO,
        fat_g: Decimal::ZERO,
        carbs_g: Decimal::ZERO,
        is_available: true,
    }
}

fn search(term: &str) -> RecipeListQuery {
    RecipeListQuery {
        search: Some(term.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn price_is_checked_after_rounding() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    assert_matches!(
        catalog.create_ingredient(ingredient("Saffron", dec!(0.004))).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_eq!(Ingredient::find().count(&*app.state.db).await.unwrap(), 0);

    let stored = catalog
        .create_ingredient(ingredient("Saffron", dec!(0.005)))
        .await
        .unwrap();
    assert_eq!(stored.price_per_unit, dec!(0.01));
}

#[tokio::test]
async fn search_matches_name_or_description_ignoring_case() {
    let app = TestApp::new().await;
    app.seed_butter_chicken().await;
    app.state
        .services
        .catalog
        .create_recipe(CreateRecipeInput {
            name: "Rajma Chawal".into(),
            slug: None,
            category_id: None,
            description: "Kidney beans slow cooked in a Punjabi gravy".into(),
            instructions: String::new(),
            difficulty: Difficulty::Easy,
            prep_time_minutes: 15,
            cook_time_minutes: 45,
            default_servings: 2,
            min_servings: 1,
            max_servings: 6,
            base_price: dec!(179),
            is_published: true,
            is_seasonal: false,
            available_from: None,
            available_until: None,
        })
        .await
        .unwrap();
    let catalog = &app.state.services.catalog;

    let by_description = catalog.list_recipes(search("punjabi")).await.unwrap();
    assert_eq!(by_description.total, 1);
    assert_eq!(by_description.recipes[0].slug, "rajma-chawal");

    let by_name = catalog.list_recipes(search("BUTTER")).await.unwrap();
    assert_eq!(by_name.total, 1);
    assert_eq!(by_name.recipes[0].slug, "butter-chicken");

    assert_eq!(catalog.list_recipes(search("paneer")).await.unwrap().total, 0);
    assert_eq!(catalog.list_recipes(search("  ")).await.unwrap().total, 2);
}

#[tokio::test]
async fn ingredient_used_by_a_recipe_cannot_be_deleted() {
    let app = TestApp::new().await;
    let curry = app.seed_curry().await;

    let result = Ingredient::delete_by_id(curry.ingredients[0].id)
        .exec(&*app.state.db)
        .await;

    assert!(result.is_err());
    assert_eq!(RecipeIngredient::find().count(&*app.state.db).await.unwrap(), 3);
    assert!(Ingredient::find_by_id(curry.ingredients[0].id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .is_some());
}
