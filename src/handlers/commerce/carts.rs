use crate::handlers::common::{
    created_response, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::commerce::{AddToCartInput, UpdateCartItemInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

/// Creates the router for the caller's cart
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_to_cart))
        .route("/items/:item_id", put(update_cart_item).delete(remove_cart_item))
}

/// Get the caller's cart with priced lines
async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(&user.user_id).await?;
    Ok(success_response(cart))
}

/// Add a customized recipe to the cart
async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let item = state.services.cart.add_item(&user.user_id, payload).await?;
    Ok(created_response(item))
}

/// Replace quantity, servings and exclusions of a cart item
async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let updated = state
        .services
        .cart
        .update_item(&user.user_id, item_id, payload)
        .await?;

    Ok(match updated {
        Some(item) => success_response(item),
        None => no_content_response(),
    })
}

/// Remove an item from the cart
async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .cart
        .remove_item(&user.user_id, item_id)
        .await?;
    Ok(no_content_response())
}
