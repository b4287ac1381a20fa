use crate::handlers::common::{created_response, success_response};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::commerce::{DeliveryDetails, PaymentConfirmation},
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout))
        .route("/payment", post(begin_payment))
        .route("/payment/verify", post(verify_payment))
}

/// Place a pending order for the cart without online payment
async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DeliveryDetails>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .checkout
        .checkout(&user.user_id, payload)
        .await?;
    Ok(created_response(order))
}

/// Start an online payment for the cart total
async fn begin_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DeliveryDetails>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .services
        .checkout
        .begin_payment(&user.user_id, payload)
        .await?;
    Ok(success_response(session))
}

/// Verify the gateway callback and place a confirmed order
async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PaymentConfirmation>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .checkout
        .confirm_payment(&user.user_id, payload)
        .await?;
    Ok(created_response(order))
}
