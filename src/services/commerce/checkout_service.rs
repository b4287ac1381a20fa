use crate::{
    config::AppConfig,
    entities::{
        commerce::{cart, cart_item, cart_item_exclusion, Cart, CartItem, CartItemExclusion},
        order, order_item, payment_intent, Order, OrderItemModel, OrderModel, OrderStatus,
        PaymentIntent, PaymentIntentModel, PaymentIntentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::{
        cart_service::{claim_cart, load_lines, CartLine},
        order_service::OrderDetail,
        payment_gateway::{PaymentConfirmation, PaymentGateway, VerifiedPayment},
        pricing_service::round_money,
    },
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Tax and shipping applied on top of the cart subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargesPolicy {
    pub shipping_flat_rate: Decimal,
    pub tax_rate: Decimal,
}

impl ChargesPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            shipping_flat_rate: config.shipping_flat_rate,
            tax_rate: config.tax_rate,
        }
    }

    pub fn apply(&self, subtotal: Decimal) -> Charges {
        let subtotal = round_money(subtotal);
        let tax = round_money(subtotal * self.tax_rate);
        let shipping = round_money(self.shipping_flat_rate);
        Charges {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Charges {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Delivery form as submitted.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DeliveryDetails {
    #[validate(length(max = 500))]
    pub address: String,
    /// `YYYY-MM-DD`, today or later
    pub delivery_date: Option<String>,
}

/// Delivery details after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub address: String,
    pub date: Option<NaiveDate>,
}

impl DeliveryDetails {
    pub fn parse(&self, today: NaiveDate) -> Result<Delivery, ServiceError> {
        self.validate()?;

        let address = self.address.trim();
        if address.is_empty() {
            return Err(ServiceError::ValidationError(
                "Delivery address is required".to_string(),
            ));
        }

        let date = match self.delivery_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    ServiceError::ValidationError(format!(
                        "Invalid delivery date {}, expected YYYY-MM-DD",
                        raw
                    ))
                })?;
                Some(date)
            }
        };

        let delivery = Delivery {
            address: address.to_string(),
            date,
        };
        delivery.ensure_not_past(today)?;
        Ok(delivery)
    }
}

impl Delivery {
    pub fn ensure_not_past(&self, today: NaiveDate) -> Result<(), ServiceError> {
        match self.date {
            Some(date) if date < today => Err(ServiceError::ValidationError(
                "Delivery date cannot be in the past".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// What the client needs to open the gateway checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub reference: String,
    pub client_token: String,
    pub amount: Decimal,
    pub amount_minor: i64,
    pub currency: String,
    pub charges: Charges,
}

/// Turns carts into orders.
///
/// Both checkout flows end in `CheckoutService::place_order`, which runs
/// in one transaction: any failure leaves the cart untouched and writes no
/// order.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    policy: ChargesPolicy,
    currency: String,
    order_number_prefix: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            policy: ChargesPolicy::from_config(config),
            currency: config.currency.clone(),
            order_number_prefix: config.order_number_prefix.clone(),
        }
    }

    pub fn payments_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Direct checkout: places a pending order for the user's cart.
    #[instrument(skip(self))]
    pub async fn checkout(
        &self,
        user_id: &str,
        details: DeliveryDetails,
    ) -> Result<OrderDetail, ServiceError> {
        let delivery = details.parse(Utc::now().date_naive())?;
        self.place_order(user_id, delivery, None).await
    }

    /// Registers a payable with the gateway for the current cart total.
    #[instrument(skip(self))]
    pub async fn begin_payment(
        &self,
        user_id: &str,
        details: DeliveryDetails,
    ) -> Result<PaymentSession, ServiceError> {
        let gateway = self.gateway()?;
        let delivery = details.parse(Utc::now().date_naive())?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::EmptyCart)?;
        let lines = load_lines(&*self.db, cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        let charges = self.policy.apply(subtotal(&lines));

        let payable = gateway
            .create_payable(charges.total, &self.currency, &cart.id.to_string())
            .await?;

        let now = Utc::now();
        payment_intent::ActiveModel {
            id: Set(Uuid::new_v4()),
            reference: Set(payable.reference.clone()),
            user_id: Set(user_id.to_string()),
            amount: Set(charges.total),
            currency: Set(self.currency.clone()),
            status: Set(PaymentIntentStatus::Created),
            delivery_address: Set(delivery.address),
            delivery_date: Set(delivery.date),
            payment_reference: Set(None),
            order_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::PaymentInitiated {
                reference: payable.reference.clone(),
                amount: charges.total,
            })
            .await;

        info!(
            "Started payment {} for {} {}",
            payable.reference, charges.total, self.currency
        );
        Ok(PaymentSession {
            reference: payable.reference,
            client_token: payable.client_token,
            amount: charges.total,
            amount_minor: payable.amount_minor,
            currency: payable.currency,
            charges,
        })
    }

    /// Verifies a gateway confirmation and places a confirmed order with the
    /// delivery details captured when payment started.
    #[instrument(skip(self, confirmation), fields(reference = %confirmation.order_reference))]
    pub async fn confirm_payment(
        &self,
        user_id: &str,
        confirmation: PaymentConfirmation,
    ) -> Result<OrderDetail, ServiceError> {
        let gateway = self.gateway()?;
        confirmation.validate()?;

        let intent = PaymentIntent::find()
            .filter(payment_intent::Column::Reference.eq(confirmation.order_reference.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Payment {} not found",
                    confirmation.order_reference
                ))
            })?;
        if intent.user_id != user_id {
            return Err(ServiceError::AuthorizationError(format!(
                "Payment {} belongs to another user",
                intent.reference
            )));
        }

        let verified = match gateway.verify(&confirmation) {
            Ok(verified) => verified,
            Err(err) => {
                warn!("Rejected confirmation for payment {}", intent.reference);
                self.mark_failed(intent).await?;
                return Err(err);
            }
        };

        // The date was checked when payment started; midnight may have passed
        let delivery = Delivery {
            address: intent.delivery_address,
            date: intent.delivery_date,
        };
        delivery.ensure_not_past(Utc::now().date_naive())?;
        self.place_order(user_id, delivery, Some(verified)).await
    }

    /// Converts the user's cart into an order.
    ///
    /// Without a payment the order is `pending`. With a verified payment the
    /// matching intent must be unused and for exactly the order total; the
    /// order is `confirmed` and the intent marked paid.
    #[instrument(skip(self, delivery))]
    pub(crate) async fn place_order(
        &self,
        user_id: &str,
        delivery: Delivery,
        payment: Option<VerifiedPayment>,
    ) -> Result<OrderDetail, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;
        let cart = claim_cart(&txn, &cart).await?;

        let lines = load_lines(&txn, cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        let charges = self.policy.apply(subtotal(&lines));

        let intent = match &payment {
            Some(verified) => Some(claim_intent(&txn, user_id, verified, charges.total).await?),
            None => None,
        };

        let order_number = generate_order_number(&txn, &self.order_number_prefix).await?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let status = if payment.is_some() {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        };

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            user_id: Set(Some(user_id.to_string())),
            status: Set(status),
            subtotal: Set(charges.subtotal),
            tax: Set(charges.tax),
            shipping: Set(charges.shipping),
            total: Set(charges.total),
            currency: Set(self.currency.clone()),
            delivery_address: Set(delivery.address),
            delivery_date: Set(delivery.date),
            payment_reference: Set(payment.as_ref().map(|p| p.payment_reference().to_string())),
            gateway_reference: Set(payment.as_ref().map(|p| p.order_reference().to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let items: Vec<OrderItemModel> = lines
            .iter()
            .map(|line| snapshot_line(order_id, line))
            .collect();
        order_item::Entity::insert_many(items.iter().map(|item| order_item::ActiveModel {
            id: Set(item.id),
            order_id: Set(item.order_id),
            recipe_id: Set(item.recipe_id),
            recipe_name: Set(item.recipe_name.clone()),
            servings: Set(item.servings),
            quantity: Set(item.quantity),
            excluded_ingredients: Set(item.excluded_ingredients.clone()),
            price: Set(item.price),
        }))
        .exec_without_returning(&txn)
        .await?;

        let item_ids: Vec<Uuid> = lines.iter().map(|line| line.item.id).collect();
        CartItemExclusion::delete_many()
            .filter(cart_item_exclusion::Column::CartItemId.is_in(item_ids))
            .exec(&txn)
            .await?;
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        if let (Some(intent), Some(verified)) = (intent, &payment) {
            let mut active: payment_intent::ActiveModel = intent.into();
            active.status = Set(PaymentIntentStatus::Paid);
            active.payment_reference = Set(Some(verified.payment_reference().to_string()));
            active.order_id = Set(Some(order_id));
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        txn.commit().await?;

        let paid = payment.is_some();
        counter!("mealkit.orders_placed", 1);
        if paid {
            counter!("mealkit.orders_paid", 1);
        }
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                order_number: order.order_number.clone(),
                total: order.total,
                paid,
            })
            .await;

        info!(
            "Placed order {} ({}) for {} with {} items, total {}",
            order.order_number,
            order.status,
            user_id,
            items.len(),
            order.total
        );
        Ok(OrderDetail::new(order, items))
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>, ServiceError> {
        self.gateway.as_ref().ok_or_else(|| {
            ServiceError::ServiceUnavailable("Online payment is not configured".to_string())
        })
    }

    async fn mark_failed(&self, intent: PaymentIntentModel) -> Result<(), ServiceError> {
        if intent.status != PaymentIntentStatus::Created {
            return Ok(());
        }
        let mut active: payment_intent::ActiveModel = intent.into();
        active.status = Set(PaymentIntentStatus::Failed);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}

fn subtotal(lines: &[CartLine]) -> Decimal {
    lines.iter().map(|line| line.item.line_total()).sum()
}

fn snapshot_line(order_id: Uuid, line: &CartLine) -> OrderItemModel {
    OrderItemModel {
        id: Uuid::new_v4(),
        order_id,
        recipe_id: Some(line.recipe.id),
        recipe_name: line.recipe.name.clone(),
        servings: line.item.servings,
        quantity: line.item.quantity,
        excluded_ingredients: order_item::encode_exclusions(&line.exclusions),
        price: line.item.customized_price,
    }
}

/// Loads the intent a verified payment was made against and checks it can
/// pay for this order.
async fn claim_intent<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    verified: &VerifiedPayment,
    total: Decimal,
) -> Result<PaymentIntentModel, ServiceError> {
    let intent = PaymentIntent::find()
        .filter(payment_intent::Column::Reference.eq(verified.order_reference()))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::PaymentVerificationError(format!(
                "Unknown payment {}",
                verified.order_reference()
            ))
        })?;

    if intent.user_id != user_id {
        return Err(ServiceError::AuthorizationError(format!(
            "Payment {} belongs to another user",
            intent.reference
        )));
    }
    if intent.status != PaymentIntentStatus::Created {
        return Err(ServiceError::PaymentVerificationError(format!(
            "Payment {} has already been used",
            intent.reference
        )));
    }
    if round_money(intent.amount) != total {
        return Err(ServiceError::PaymentVerificationError(format!(
            "Payment {} was for {} but the cart now totals {}",
            intent.reference,
            round_money(intent.amount),
            total
        )));
    }

    Ok(intent)
}

/// `<PREFIX>-<8 uppercase hex>`, checked against existing orders.
async fn generate_order_number<C: ConnectionTrait>(
    conn: &C,
    prefix: &str,
) -> Result<String, ServiceError> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = format_order_number(prefix, rand::thread_rng().gen());
        let taken = Order::find()
            .filter(order::Column::OrderNumber.eq(candidate.as_str()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        warn!("Order number {} already taken, retrying", candidate);
    }
    Err(ServiceError::Conflict(
        "Could not allocate a unique order number".to_string(),
    ))
}

fn format_order_number(prefix: &str, value: u32) -> String {
    format!("{}-{:08X}", prefix, value)
}
