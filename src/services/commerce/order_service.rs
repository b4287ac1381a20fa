use crate::{
    entities::{order, order_item, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::pricing_service::round_money,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

/// Read and status operations on placed orders
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// The user's orders, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        user_id: &str,
        query: OrderListQuery,
    ) -> Result<OrderListResult, ServiceError> {
        let db_query = Order::find().filter(order::Column::UserId.eq(user_id));
        let total = db_query.clone().count(&*self.db).await?;

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let orders = db_query
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderNumber)
            .limit(limit)
            .offset(query.offset.unwrap_or(0))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(normalize_order)
            .collect();

        Ok(OrderListResult { orders, total })
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, user_id: &str, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = self.owned_order(user_id, order_id).await?;
        let items = order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::RecipeName)
            .all(&*self.db)
            .await?;

        Ok(OrderDetail::new(order, items))
    }

    #[instrument(skip(self))]
    pub async fn get_order_by_number(
        &self,
        user_id: &str,
        order_number: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let order_id = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .map(|order| order.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        self.get_order(user_id, order_id).await
    }

    /// Cancels an order that has not yet been delivered or cancelled.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, user_id: &str, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        ensure_owner(&order, user_id)?;

        let old_status = order.status;
        if !old_status.can_transition_to(OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is {} and cannot be cancelled",
                order.order_number, old_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let order = normalize_order(active.update(&txn).await?);

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: order.status.to_string(),
            })
            .await;

        info!("Cancelled order {}", order.order_number);
        Ok(order)
    }

    async fn owned_order(&self, user_id: &str, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        ensure_owner(&order, user_id)?;
        Ok(normalize_order(order))
    }
}

fn ensure_owner(order: &OrderModel, user_id: &str) -> Result<(), ServiceError> {
    if order.user_id.as_deref() != Some(user_id) {
        return Err(ServiceError::AuthorizationError(format!(
            "Order {} belongs to another user",
            order.id
        )));
    }
    Ok(())
}

pub(crate) fn normalize_order(mut order: OrderModel) -> OrderModel {
    order.subtotal = round_money(order.subtotal);
    order.tax = round_money(order.tax);
    order.shipping = round_money(order.shipping);
    order.total = round_money(order.total);
    order
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderListResult {
    pub orders: Vec<OrderModel>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItemModel,
    pub line_total: Decimal,
}

/// An order with its frozen line items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemView>,
}

impl OrderDetail {
    pub fn new(order: OrderModel, items: Vec<OrderItemModel>) -> Self {
        let items = items
            .into_iter()
            .map(|mut item| {
                item.price = round_money(item.price);
                OrderItemView {
                    line_total: item.line_total(),
                    item,
                }
            })
            .collect();
        Self {
            order: normalize_order(order),
            items,
        }
    }

    /// Σ price × quantity over the items
    pub fn items_subtotal(&self) -> Decimal {
        self.items.iter().map(|item| item.line_total).sum()
    }
}
