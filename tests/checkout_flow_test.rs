mod common;

use assert_matches::assert_matches;
use common::{TestApp, OTHER_USER, TEST_USER};
use mealkit_api::{
    entities::{
        commerce::CartItem, order, payment_intent, Order, OrderItem, OrderStatus, PaymentIntent,
        PaymentIntentStatus,
    },
    errors::ServiceError,
    services::commerce::{AddToCartInput, DeliveryDetails, PaymentConfirmation},
};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use uuid::Uuid;

fn delivery() -> DeliveryDetails {
    DeliveryDetails {
        address: "12 MG Road, Bengaluru".to_string(),
        delivery_date: None,
    }
}

async fn add(app: &TestApp, user: &str, recipe_id: Uuid, servings: i32, quantity: i32) {
    app.state
        .services
        .cart
        .add_item(
            user,
            AddToCartInput {
                recipe_id,
                servings: Some(servings),
                quantity: Some(quantity),
                excluded_ingredients: Vec::new(),
            },
        )
        .await
        .expect("add to cart");
}

async fn order_count(app: &TestApp) -> u64 {
    Order::find().count(&*app.state.db).await.unwrap()
}

#[tokio::test]
async fn empty_cart_checkout_creates_nothing() {
    let app = TestApp::new().await;

    assert_matches!(
        app.state.services.checkout.checkout(TEST_USER, delivery()).await,
        Err(ServiceError::EmptyCart)
    );

    app.state.services.cart.get_cart(TEST_USER).await.unwrap();
    assert_matches!(
        app.state.services.checkout.checkout(TEST_USER, delivery()).await,
        Err(ServiceError::EmptyCart)
    );
    assert_eq!(order_count(&app).await, 0);
}

#[tokio::test]
async fn checkout_totals_items_plus_shipping_and_empties_cart() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    let curry = app.seed_curry().await;
    add(&app, TEST_USER, chicken.recipe.id, 8, 1).await;
    add(&app, TEST_USER, curry.recipe.id, 2, 2).await;

    let detail = app
        .state
        .services
        .checkout
        .checkout(TEST_USER, delivery())
        .await
        .unwrap();

    // 448 + 2 * 128
    assert_eq!(detail.order.subtotal, dec!(704.00));
    assert_eq!(detail.order.shipping, dec!(50.00));
    assert_eq!(detail.order.tax, dec!(0.00));
    assert_eq!(detail.order.total, dec!(754.00));
    assert_eq!(detail.items_subtotal(), detail.order.subtotal);
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.user_id.as_deref(), Some(TEST_USER));
    assert!(detail.order.order_number.starts_with("ORD-"));
    assert_eq!(detail.order.order_number.len(), "ORD-".len() + 8);
    assert_eq!(detail.items.len(), 2);

    let cart = app.state.services.cart.get_cart(TEST_USER).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(CartItem::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn order_items_snapshot_cart_prices() {
    let app = TestApp::new().await;
    let curry = app.seed_curry().await;
    app.state
        .services
        .cart
        .add_item(
            TEST_USER,
            AddToCartInput {
                recipe_id: curry.recipe.id,
                servings: Some(4),
                quantity: Some(1),
                excluded_ingredients: vec![curry.line_ids[2].to_string()],
            },
        )
        .await
        .unwrap();

    let detail = app
        .state
        .services
        .checkout
        .checkout(TEST_USER, delivery())
        .await
        .unwrap();

    let item = &detail.items[0];
    assert_eq!(item.item.recipe_name, "Chana Curry");
    assert_eq!(item.item.servings, 4);
    assert_eq!(item.item.price, dec!(132.00));
    assert_eq!(item.item.excluded_ingredients, curry.line_ids[2].to_string());

    let stored = OrderItem::find().count(&*app.state.db).await.unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn past_delivery_date_is_rejected() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;

    let result = app
        .state
        .services
        .checkout
        .checkout(
            TEST_USER,
            DeliveryDetails {
                address: "12 MG Road".to_string(),
                delivery_date: Some("2001-01-01".to_string()),
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_eq!(order_count(&app).await, 0);
    assert_eq!(
        app.state.services.cart.get_cart(TEST_USER).await.unwrap().total_units,
        1
    );
}

#[tokio::test]
async fn verified_payment_places_confirmed_order() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 2).await;
    let checkout = &app.state.services.checkout;

    let session = checkout.begin_payment(TEST_USER, delivery()).await.unwrap();
    assert_eq!(session.amount, dec!(498.00));
    assert_eq!(session.amount_minor, 49_800);
    assert_eq!(session.currency, "INR");

    let signature = app.gateway.sign(&session.reference, "pay_001").unwrap();
    let detail = checkout
        .confirm_payment(
            TEST_USER,
            PaymentConfirmation {
                order_reference: session.reference.clone(),
                payment_reference: "pay_001".to_string(),
                signature,
            },
        )
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Confirmed);
    assert_eq!(detail.order.total, dec!(498.00));
    assert_eq!(detail.order.payment_reference.as_deref(), Some("pay_001"));
    assert_eq!(detail.order.delivery_address, "12 MG Road, Bengaluru");

    let intent = PaymentIntent::find()
        .filter(payment_intent::Column::Reference.eq(session.reference.as_str()))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentIntentStatus::Paid);
    assert_eq!(intent.order_id, Some(detail.order.id));
    assert!(app.state.services.cart.get_cart(TEST_USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn tampered_signature_is_rejected_and_intent_failed() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    let checkout = &app.state.services.checkout;

    let session = checkout.begin_payment(TEST_USER, delivery()).await.unwrap();
    let signature = app.gateway.sign(&session.reference, "pay_001").unwrap();

    let result = checkout
        .confirm_payment(
            TEST_USER,
            PaymentConfirmation {
                order_reference: session.reference.clone(),
                payment_reference: "pay_002".to_string(),
                signature,
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::PaymentVerificationError(_)));
    assert_eq!(order_count(&app).await, 0);

    let intent = PaymentIntent::find()
        .filter(payment_intent::Column::Reference.eq(session.reference.as_str()))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentIntentStatus::Failed);
    assert_eq!(
        app.state.services.cart.get_cart(TEST_USER).await.unwrap().total_units,
        1
    );
}

#[tokio::test]
async fn paid_intent_cannot_be_reused() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    let checkout = &app.state.services.checkout;

    let session = checkout.begin_payment(TEST_USER, delivery()).await.unwrap();
    let confirmation = PaymentConfirmation {
        order_reference: session.reference.clone(),
        payment_reference: "pay_001".to_string(),
        signature: app.gateway.sign(&session.reference, "pay_001").unwrap(),
    };
    checkout
        .confirm_payment(TEST_USER, confirmation.clone())
        .await
        .unwrap();

    // Same total again, so only the intent state can stop the replay
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    assert_matches!(
        checkout.confirm_payment(TEST_USER, confirmation).await,
        Err(ServiceError::PaymentVerificationError(_))
    );
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn payment_for_stale_total_is_rejected() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    let checkout = &app.state.services.checkout;

    let session = checkout.begin_payment(TEST_USER, delivery()).await.unwrap();
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;

    let result = checkout
        .confirm_payment(
            TEST_USER,
            PaymentConfirmation {
                order_reference: session.reference.clone(),
                payment_reference: "pay_001".to_string(),
                signature: app.gateway.sign(&session.reference, "pay_001").unwrap(),
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::PaymentVerificationError(_)));
    assert_eq!(order_count(&app).await, 0);
    assert_eq!(
        app.state.services.cart.get_cart(TEST_USER).await.unwrap().total_units,
        2
    );
}

#[tokio::test]
async fn confirmation_after_delivery_date_passed_is_rejected() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    let checkout = &app.state.services.checkout;

    let today = Utc::now().date_naive();
    let session = checkout
        .begin_payment(
            TEST_USER,
            DeliveryDetails {
                delivery_date: Some(today.format("%Y-%m-%d").to_string()),
                ..delivery()
            },
        )
        .await
        .unwrap();

    // Payment confirmed the next day
    PaymentIntent::update_many()
        .col_expr(
            payment_intent::Column::DeliveryDate,
            Expr::value(today - Duration::days(1)),
        )
        .filter(payment_intent::Column::Reference.eq(session.reference.as_str()))
        .exec(&*app.state.db)
        .await
        .unwrap();

    let result = checkout
        .confirm_payment(
            TEST_USER,
            PaymentConfirmation {
                order_reference: session.reference.clone(),
                payment_reference: "pay_001".to_string(),
                signature: app.gateway.sign(&session.reference, "pay_001").unwrap(),
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_eq!(order_count(&app).await, 0);
    assert_eq!(
        app.state.services.cart.get_cart(TEST_USER).await.unwrap().total_units,
        1
    );
}

#[tokio::test]
async fn failure_after_order_insert_rolls_back_everything() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    let curry = app.seed_curry().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    add(&app, TEST_USER, curry.recipe.id, 2, 2).await;
    let before = app.state.services.cart.get_cart(TEST_USER).await.unwrap();

    // The order row goes in, then writing its items fails
    app.state
        .db
        .execute_unprepared("DROP TABLE order_items")
        .await
        .unwrap();

    assert_matches!(
        app.state.services.checkout.checkout(TEST_USER, delivery()).await,
        Err(ServiceError::DatabaseError(_))
    );

    assert_eq!(order_count(&app).await, 0);
    let after = app.state.services.cart.get_cart(TEST_USER).await.unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(after.total_units, 3);
    assert_eq!(after.subtotal, before.subtotal);
    assert_eq!(after.items, before.items);
}

#[tokio::test]
async fn another_users_payment_is_forbidden() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    add(&app, OTHER_USER, chicken.recipe.id, 4, 1).await;
    let checkout = &app.state.services.checkout;

    let session = checkout.begin_payment(TEST_USER, delivery()).await.unwrap();
    let result = checkout
        .confirm_payment(
            OTHER_USER,
            PaymentConfirmation {
                order_reference: session.reference.clone(),
                payment_reference: "pay_001".to_string(),
                signature: app.gateway.sign(&session.reference, "pay_001").unwrap(),
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::AuthorizationError(_)));
    assert_eq!(order_count(&app).await, 0);
}

#[tokio::test]
async fn unknown_payment_reference_is_not_found() {
    let app = TestApp::new().await;
    let result = app
        .state
        .services
        .checkout
        .confirm_payment(
            TEST_USER,
            PaymentConfirmation {
                order_reference: "order_missing".to_string(),
                payment_reference: "pay_001".to_string(),
                signature: "00".to_string(),
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn begin_payment_on_empty_cart_fails() {
    let app = TestApp::new().await;
    assert_matches!(
        app.state
            .services
            .checkout
            .begin_payment(TEST_USER, delivery())
            .await,
        Err(ServiceError::EmptyCart)
    );
    assert_eq!(PaymentIntent::find().count(&*app.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn payments_unavailable_without_credentials() {
    let mut cfg = mealkit_api::config::AppConfig::new(
        "sqlite::memory:".to_string(),
        common::TEST_JWT_SECRET.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    let app = TestApp::with_config(cfg).await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;

    assert!(!app.state.services.checkout.payments_enabled());
    assert_matches!(
        app.state
            .services
            .checkout
            .begin_payment(TEST_USER, delivery())
            .await,
        Err(ServiceError::ServiceUnavailable(_))
    );
}

#[tokio::test]
async fn orders_are_listed_and_cancelled_by_owner_only() {
    let app = TestApp::new().await;
    let chicken = app.seed_butter_chicken().await;
    add(&app, TEST_USER, chicken.recipe.id, 4, 1).await;
    let placed = app
        .state
        .services
        .checkout
        .checkout(TEST_USER, delivery())
        .await
        .unwrap();
    let orders = &app.state.services.orders;

    let listed = orders
        .list_orders(TEST_USER, Default::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.orders[0].id, placed.order.id);
    assert_eq!(
        orders
            .list_orders(OTHER_USER, Default::default())
            .await
            .unwrap()
            .total,
        0
    );

    let by_number = orders
        .get_order_by_number(TEST_USER, &placed.order.order_number)
        .await
        .unwrap();
    assert_eq!(by_number.order.id, placed.order.id);
    assert_eq!(by_number.items.len(), 1);

    assert_matches!(
        orders.get_order(OTHER_USER, placed.order.id).await,
        Err(ServiceError::AuthorizationError(_))
    );
    assert_matches!(
        orders.cancel_order(OTHER_USER, placed.order.id).await,
        Err(ServiceError::AuthorizationError(_))
    );

    let cancelled = orders.cancel_order(TEST_USER, placed.order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_matches!(
        orders.cancel_order(TEST_USER, placed.order.id).await,
        Err(ServiceError::InvalidOperation(_))
    );

    let stored = Order::find()
        .filter(order::Column::Id.eq(placed.order.id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
}
