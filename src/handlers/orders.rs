use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::handlers::common::{success_response, PaginatedResponse, PaginationParams};
use crate::services::commerce::OrderListQuery;
use crate::{auth::AuthUser, errors::ServiceError, AppState};

/// Creates the router for the caller's orders
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
}

/// List the caller's orders, newest first
async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .services
        .orders
        .list_orders(
            &user.user_id,
            OrderListQuery {
                limit: Some(pagination.limit()),
                offset: Some(pagination.offset()),
            },
        )
        .await?;

    Ok(success_response(PaginatedResponse::new(
        result.orders,
        &pagination,
        result.total,
    )))
}

/// Get one order by id or order number
async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = &state.services.orders;
    let detail = match Uuid::parse_str(&id) {
        Ok(order_id) => orders.get_order(&user.user_id, order_id).await?,
        Err(_) => orders.get_order_by_number(&user.user_id, &id).await?,
    };
    Ok(success_response(detail))
}

/// Cancel an order that has not been delivered
async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .cancel_order(&user.user_id, order_id)
        .await?;
    Ok(success_response(order))
}
