use crate::{
    entities::commerce::{
        ingredient, recipe, recipe_category, recipe_ingredient, Difficulty, Ingredient,
        IngredientModel, MeasurementUnit, Recipe, RecipeCategory, RecipeCategoryModel,
        RecipeIngredient, RecipeIngredientModel, RecipeModel,
    },
    errors::ServiceError,
    services::commerce::pricing_service::{
        round_money, Nutrition, PriceBreakdown, PricedIngredient, PricedRecipe, MIN_LINE_PRICE,
    },
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

/// Recipe catalog: reference data management and storefront reads
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<RecipeCategoryModel, ServiceError> {
        input.validate()?;
        let slug = input
            .slug
            .as_deref()
            .map(slugify)
            .unwrap_or_else(|| slugify(&input.name));

        let taken = RecipeCategory::find()
            .filter(
                recipe_category::Column::Name
                    .eq(input.name.as_str())
                    .or(recipe_category::Column::Slug.eq(slug.as_str())),
            )
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Category {} already exists",
                input.name
            )));
        }

        let category = recipe_category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!("Created recipe category {}", category.slug);
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn create_ingredient(
        &self,
        input: CreateIngredientInput,
    ) -> Result<IngredientModel, ServiceError> {
        input.validate()?;
        let price_per_unit = round_money(input.price_per_unit);
        if price_per_unit <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price_per_unit must be at least 0.01".to_string(),
            ));
        }
        let nutrition = [
            input.calories,
            input.protein_g,
            input.fat_g,
            input.carbs_g,
        ];
        if nutrition.iter().any(|value| value.is_sign_negative()) {
            return Err(ServiceError::ValidationError(
                "nutritional values cannot be negative".to_string(),
            ));
        }

        let existing = Ingredient::find()
            .filter(ingredient::Column::Name.eq(input.name.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Ingredient {} already exists",
                input.name
            )));
        }

        let now = Utc::now();
        let ingredient = ingredient::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            default_unit: Set(input.default_unit),
            price_per_unit: Set(price_per_unit),
            calories: Set(input.calories.round_dp(2)),
            protein_g: Set(input.protein_g.round_dp(2)),
            fat_g: Set(input.fat_g.round_dp(2)),
            carbs_g: Set(input.carbs_g.round_dp(2)),
            is_available: Set(input.is_available),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!("Created ingredient {}", ingredient.name);
        Ok(ingredient)
    }

    /// Create a recipe. Serving bounds and the seasonal window are checked
    /// here so that every stored recipe can be priced.
    #[instrument(skip(self))]
    pub async fn create_recipe(
        &self,
        input: CreateRecipeInput,
    ) -> Result<RecipeModel, ServiceError> {
        input.validate()?;
        input.check_bounds()?;

        let slug = input
            .slug
            .as_deref()
            .map(slugify)
            .unwrap_or_else(|| slugify(&input.name));
        if slug.is_empty() {
            return Err(ServiceError::ValidationError(
                "recipe slug cannot be empty".to_string(),
            ));
        }

        let existing = Recipe::find()
            .filter(recipe::Column::Slug.eq(slug.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Recipe slug {} already exists",
                slug
            )));
        }

        if let Some(category_id) = input.category_id {
            RecipeCategory::find_by_id(category_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Category {} not found", category_id))
                })?;
        }

        let now = Utc::now();
        let recipe = recipe::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(input.category_id),
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description),
            instructions: Set(input.instructions),
            difficulty: Set(input.difficulty),
            prep_time_minutes: Set(input.prep_time_minutes),
            cook_time_minutes: Set(input.cook_time_minutes),
            default_servings: Set(input.default_servings),
            min_servings: Set(input.min_servings),
            max_servings: Set(input.max_servings),
            base_price: Set(round_money(input.base_price)),
            is_published: Set(input.is_published),
            is_seasonal: Set(input.is_seasonal),
            available_from: Set(input.available_from),
            available_until: Set(input.available_until),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!("Created recipe {} ({})", recipe.slug, recipe.id);
        Ok(recipe)
    }

    #[instrument(skip(self))]
    pub async fn add_recipe_ingredient(
        &self,
        recipe_id: Uuid,
        input: AddRecipeIngredientInput,
    ) -> Result<RecipeIngredientModel, ServiceError> {
        input.validate()?;
        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        Recipe::find_by_id(recipe_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", recipe_id)))?;
        Ingredient::find_by_id(input.ingredient_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Ingredient {} not found", input.ingredient_id))
            })?;

        let duplicate = RecipeIngredient::find()
            .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
            .filter(recipe_ingredient::Column::IngredientId.eq(input.ingredient_id))
            .one(&*self.db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Ingredient {} is already part of recipe {}",
                input.ingredient_id, recipe_id
            )));
        }

        let row = recipe_ingredient::ActiveModel {
            id: Set(Uuid::new_v4()),
            recipe_id: Set(recipe_id),
            ingredient_id: Set(input.ingredient_id),
            quantity: Set(input.quantity.round_dp(3)),
            is_optional: Set(input.is_optional),
            notes: Set(input.notes),
        }
        .insert(&*self.db)
        .await?;

        info!(
            "Added ingredient {} to recipe {}",
            row.ingredient_id, recipe_id
        );
        Ok(row)
    }

    /// Published recipes, newest first. `search` matches name or
    /// description, ignoring case.
    #[instrument(skip(self))]
    pub async fn list_recipes(
        &self,
        query: RecipeListQuery,
    ) -> Result<RecipeListResult, ServiceError> {
        let mut db_query = Recipe::find().filter(recipe::Column::IsPublished.eq(true));

        if let Some(category_slug) = &query.category {
            let category = RecipeCategory::find()
                .filter(recipe_category::Column::Slug.eq(category_slug.as_str()))
                .one(&*self.db)
                .await?;
            match category {
                Some(category) => {
                    db_query = db_query.filter(recipe::Column::CategoryId.eq(category.id));
                }
                None => {
                    return Ok(RecipeListResult {
                        recipes: Vec::new(),
                        total: 0,
                    })
                }
            }
        }

        let search = query.search.as_deref().map(str::trim).unwrap_or_default();
        if !search.is_empty() {
            let pattern = format!("%{}%", search.to_lowercase());
            let lower = |column: recipe::Column| Expr::expr(Func::lower(Expr::col(column)));
            db_query = db_query.filter(
                Condition::any()
                    .add(lower(recipe::Column::Name).like(pattern.as_str()))
                    .add(lower(recipe::Column::Description).like(pattern.as_str())),
            );
        }

        let total = db_query.clone().count(&*self.db).await?;

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let today = Utc::now().date_naive();
        let recipes = db_query
            .order_by_desc(recipe::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|recipe| RecipeSummary::new(normalize_recipe(recipe), today))
            .collect();

        Ok(RecipeListResult { recipes, total })
    }

    /// Recipe detail with ingredients, price and nutrition at `servings`
    /// (the recipe default when absent).
    #[instrument(skip(self))]
    pub async fn get_recipe_by_slug(
        &self,
        slug: &str,
        servings: Option<i32>,
    ) -> Result<RecipeDetail, ServiceError> {
        let recipe = self.published_recipe(slug).await?;
        let servings = servings.unwrap_or(recipe.default_servings);
        ensure_servings_in_range(&recipe, servings)?;

        let category = match recipe.category_id {
            Some(category_id) => RecipeCategory::find_by_id(category_id).one(&*self.db).await?,
            None => None,
        };

        let priced = load_priced_recipe(&*self.db, &recipe).await?;
        let price = round_money(priced.cost_for_servings(servings)?);
        let nutrition = priced.nutrition_for_servings(servings)?.rounded();
        let factor = Decimal::from(servings) / Decimal::from(recipe.default_servings);
        let ingredients = priced
            .lines
            .iter()
            .map(|line| {
                Ok(ScaledIngredient {
                    scaled_quantity: (line.quantity * factor).round_dp(3),
                    cost: round_money(priced.cost_of_excluded(line, servings)?),
                    line: line.clone(),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let today = Utc::now().date_naive();
        Ok(RecipeDetail {
            is_available: recipe.is_available_on(today),
            total_time_minutes: recipe.total_time_minutes(),
            recipe,
            category,
            servings,
            price,
            ingredients,
            nutrition,
        })
    }

    /// Read-only price for a customization. Exclusion ids may name either a
    /// recipe ingredient row or the ingredient itself; unknown ids are dropped.
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        slug: &str,
        servings: i32,
        excluded: &[String],
    ) -> Result<PriceQuote, ServiceError> {
        let recipe = self.published_recipe(slug).await?;
        ensure_servings_in_range(&recipe, servings)?;

        let priced = load_priced_recipe(&*self.db, &recipe).await?;
        let exclusions: BTreeSet<Uuid> = excluded
            .iter()
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .filter_map(|id| priced.resolve_line(id))
            .collect();
        let breakdown = priced.customized_price(servings, &exclusions)?;

        Ok(PriceQuote {
            recipe_id: recipe.id,
            servings,
            excluded_ingredients: exclusions.into_iter().collect(),
            breakdown,
            min_line_price: MIN_LINE_PRICE,
        })
    }

    async fn published_recipe(&self, slug: &str) -> Result<RecipeModel, ServiceError> {
        Recipe::find()
            .filter(recipe::Column::Slug.eq(slug))
            .filter(recipe::Column::IsPublished.eq(true))
            .one(&*self.db)
            .await?
            .map(normalize_recipe)
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", slug)))
    }
}

/// Loads a recipe's ingredient rows for pricing.
pub async fn load_priced_recipe<C: ConnectionTrait>(
    conn: &C,
    recipe: &RecipeModel,
) -> Result<PricedRecipe, ServiceError> {
    let rows = RecipeIngredient::find()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe.id))
        .order_by_asc(recipe_ingredient::Column::Id)
        .find_also_related(Ingredient)
        .all(conn)
        .await?;

    let lines = rows
        .iter()
        .map(|(row, ingredient)| {
            ingredient
                .as_ref()
                .map(|ingredient| PricedIngredient::from_models(row, ingredient))
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Recipe ingredient {} has no ingredient",
                        row.id
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PricedRecipe {
        recipe_id: recipe.id,
        default_servings: recipe.default_servings,
        lines,
    })
}

/// Rejects serving counts outside the recipe's bounds.
pub fn ensure_servings_in_range(recipe: &RecipeModel, servings: i32) -> Result<(), ServiceError> {
    if servings <= 0 {
        return Err(ServiceError::InvalidServings(format!(
            "servings must be positive, got {}",
            servings
        )));
    }
    if !recipe.accepts_servings(servings) {
        return Err(ServiceError::ValidationError(format!(
            "{} servings requested; {} allows {} to {}",
            servings, recipe.name, recipe.min_servings, recipe.max_servings
        )));
    }
    Ok(())
}

/// Some backends hand decimals back with float noise.
pub(crate) fn normalize_recipe(mut recipe: RecipeModel) -> RecipeModel {
    recipe.base_price = round_money(recipe.base_price);
    recipe
}

/// Lowercase, ASCII alphanumerics separated by single dashes.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateIngredientInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub default_unit: MeasurementUnit,
    pub price_per_unit: Decimal,
    #[serde(default)]
    pub calories: Decimal,
    #[serde(default)]
    pub protein_g: Decimal,
    #[serde(default)]
    pub fat_g: Decimal,
    #[serde(default)]
    pub carbs_g: Decimal,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateRecipeInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub slug: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    pub difficulty: Difficulty,
    #[validate(range(min = 0))]
    pub prep_time_minutes: i32,
    #[validate(range(min = 0))]
    pub cook_time_minutes: i32,
    #[validate(range(min = 1))]
    pub default_servings: i32,
    #[validate(range(min = 1))]
    pub min_servings: i32,
    #[validate(range(min = 1))]
    pub max_servings: i32,
    pub base_price: Decimal,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub is_seasonal: bool,
    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,
}

impl CreateRecipeInput {
    fn check_bounds(&self) -> Result<(), ServiceError> {
        if self.min_servings > self.max_servings {
            return Err(ServiceError::ValidationError(format!(
                "min_servings {} exceeds max_servings {}",
                self.min_servings, self.max_servings
            )));
        }
        if !(self.min_servings..=self.max_servings).contains(&self.default_servings) {
            return Err(ServiceError::ValidationError(format!(
                "default_servings {} must lie within {}..={}",
                self.default_servings, self.min_servings, self.max_servings
            )));
        }
        if self.base_price < MIN_LINE_PRICE {
            return Err(ServiceError::ValidationError(
                "base_price must be positive".to_string(),
            ));
        }
        if let (Some(from), Some(until)) = (self.available_from, self.available_until) {
            if from > until {
                return Err(ServiceError::ValidationError(
                    "available_from is after available_until".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AddRecipeIngredientInput {
    pub ingredient_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub is_optional: bool,
    #[validate(length(max = 200))]
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub total_time_minutes: i32,
    pub default_servings: i32,
    pub base_price: Decimal,
    pub is_available: bool,
}

impl RecipeSummary {
    fn new(recipe: RecipeModel, today: NaiveDate) -> Self {
        Self {
            id: recipe.id,
            total_time_minutes: recipe.total_time_minutes(),
            is_available: recipe.is_available_on(today),
            name: recipe.name,
            slug: recipe.slug,
            description: recipe.description,
            difficulty: recipe.difficulty,
            default_servings: recipe.default_servings,
            base_price: recipe.base_price,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeListResult {
    pub recipes: Vec<RecipeSummary>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaledIngredient {
    #[serde(flatten)]
    pub line: PricedIngredient,
    pub scaled_quantity: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: RecipeModel,
    pub category: Option<RecipeCategoryModel>,
    pub total_time_minutes: i32,
    pub is_available: bool,
    pub servings: i32,
    pub price: Decimal,
    pub ingredients: Vec<ScaledIngredient>,
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub recipe_id: Uuid,
    pub servings: i32,
    pub excluded_ingredients: Vec<Uuid>,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
    pub min_line_price: Decimal,
}
