use crate::{
    errors::ServiceError,
    handlers::common::{success_response, validate_input, PaginatedResponse, PaginationParams},
    services::commerce::RecipeListQuery,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

/// Public recipe browsing and price quotes
pub fn recipes_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recipes))
        .route("/:slug", get(get_recipe))
        .route("/:slug/quote", post(quote_recipe))
}

#[derive(Debug, Deserialize)]
pub struct RecipeFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServingsQuery {
    pub servings: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuoteRequest {
    #[validate(range(min = 1, max = 100))]
    pub servings: i32,
    #[serde(default)]
    pub excluded_ingredients: Vec<String>,
}

/// List published recipes
async fn list_recipes(
    State(state): State<AppState>,
    Query(filter): Query<RecipeFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .services
        .catalog
        .list_recipes(RecipeListQuery {
            category: filter.category,
            search: filter.search.filter(|s| !s.trim().is_empty()),
            limit: Some(pagination.limit()),
            offset: Some(pagination.offset()),
        })
        .await?;

    Ok(success_response(PaginatedResponse::new(
        result.recipes,
        &pagination,
        result.total,
    )))
}

/// Recipe detail, optionally scaled to `?servings=`
async fn get_recipe(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ServingsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state
        .services
        .catalog
        .get_recipe_by_slug(&slug, query.servings)
        .await?;
    Ok(success_response(detail))
}

/// Price a customization without touching the cart
async fn quote_recipe(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<QuoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let quote = state
        .services
        .catalog
        .quote(&slug, payload.servings, &payload.excluded_ingredients)
        .await?;
    Ok(success_response(quote))
}
