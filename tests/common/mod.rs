#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use chrono::NaiveDate;
use mealkit_api::{
    auth::AuthService,
    build_router,
    config::AppConfig,
    db,
    entities::commerce::{Difficulty, IngredientModel, MeasurementUnit, RecipeModel},
    events::{self, EventSender},
    handlers::AppServices,
    services::commerce::{
        AddRecipeIngredientInput, CreateIngredientInput, CreateRecipeInput, HmacPaymentGateway,
        PaymentGateway,
    },
    AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

pub const TEST_JWT_SECRET: &str =
    "k9Qw2Ez7Rt5Yu1Io3Pa8Sd6Fg4Hj0Kl9Zx2Cv7Bn5Mq1Wn3Er8Ty6Ui4Op0As9Df2Gh7Jk5Lz1Xc";
pub const TEST_PAYMENT_KEY_ID: &str = "key_test_mealkit";
pub const TEST_PAYMENT_SECRET: &str = "payment-signing-secret-for-tests";
pub const TEST_USER: &str = "user-alice";
pub const OTHER_USER: &str = "user-bob";

/// A seeded recipe together with its ingredient rows
pub struct SeededRecipe {
    pub recipe: RecipeModel,
    pub ingredients: Vec<IngredientModel>,
    pub line_ids: Vec<uuid::Uuid>,
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<HmacPaymentGateway>,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.shipping_flat_rate = dec!(50);
        cfg.tax_rate = Decimal::ZERO;
        cfg.payment_key_id = Some(TEST_PAYMENT_KEY_ID.to_string());
        cfg.payment_key_secret = Some(TEST_PAYMENT_SECRET.to_string());
        Self::with_config(cfg).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(HmacPaymentGateway::new(
            TEST_PAYMENT_KEY_ID,
            TEST_PAYMENT_SECRET,
        ));
        let payment_gateway: Option<Arc<dyn PaymentGateway>> = cfg
            .payment_credentials()
            .map(|_| gateway.clone() as Arc<dyn PaymentGateway>);

        let services =
            AppServices::with_gateway(db_arc.clone(), event_sender.clone(), &cfg, payment_gateway);
        let auth = Arc::new(AuthService::new(&cfg));
        let token = auth.issue_token(TEST_USER).expect("issue test token");

        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            auth,
            event_sender,
            services,
        };
        let router = build_router(state.clone(), CorsLayer::permissive());

        Self {
            router,
            state,
            gateway,
            token,
            _event_task: event_task,
        }
    }

    /// Bearer token for [`TEST_USER`]
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn token_for(&self, user_id: &str) -> String {
        self.state
            .auth
            .issue_token(user_id)
            .expect("issue token for user")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    pub async fn seed_ingredient(&self, name: &str, price_per_unit: Decimal) -> IngredientModel {
        self.state
            .services
            .catalog
            .create_ingredient(CreateIngredientInput {
                name: name.to_string(),
                description: None,
                default_unit: MeasurementUnit::Kg,
                price_per_unit,
                calories: dec!(1650),
                protein_g: dec!(310),
                fat_g: dec!(36),
                carbs_g: Decimal::ZERO,
                is_available: true,
            })
            .await
            .expect("seed ingredient for tests")
    }

    /// Seeds a published recipe with the given `(name, price per unit, quantity)` rows.
    pub async fn seed_recipe(
        &self,
        name: &str,
        default_servings: i32,
        rows: &[(&str, Decimal, Decimal)],
    ) -> SeededRecipe {
        self.seed_recipe_with(name, default_servings, rows, false, None, None)
            .await
    }

    pub async fn seed_recipe_with(
        &self,
        name: &str,
        default_servings: i32,
        rows: &[(&str, Decimal, Decimal)],
        is_seasonal: bool,
        available_from: Option<NaiveDate>,
        available_until: Option<NaiveDate>,
    ) -> SeededRecipe {
        let catalog = &self.state.services.catalog;
        let recipe = catalog
            .create_recipe(CreateRecipeInput {
                name: name.to_string(),
                slug: None,
                category_id: None,
                description: format!("{} for tests", name),
                instructions: String::new(),
                difficulty: Difficulty::Easy,
                prep_time_minutes: 10,
                cook_time_minutes: 20,
                default_servings,
                min_servings: 1,
                max_servings: 12,
                base_price: dec!(199),
                is_published: true,
                is_seasonal,
                available_from,
                available_until,
            })
            .await
            .expect("seed recipe for tests");

        let mut ingredients = Vec::with_capacity(rows.len());
        let mut line_ids = Vec::with_capacity(rows.len());
        for (ingredient_name, price, quantity) in rows {
            let ingredient = self.seed_ingredient(ingredient_name, *price).await;
            let line = catalog
                .add_recipe_ingredient(
                    recipe.id,
                    AddRecipeIngredientInput {
                        ingredient_id: ingredient.id,
                        quantity: *quantity,
                        is_optional: false,
                        notes: None,
                    },
                )
                .await
                .expect("seed recipe ingredient for tests");
            line_ids.push(line.id);
            ingredients.push(ingredient);
        }

        SeededRecipe {
            recipe,
            ingredients,
            line_ids,
        }
    }

    /// Butter Chicken: 0.8 kg chicken at 280/kg for 4 servings (224.00)
    pub async fn seed_butter_chicken(&self) -> SeededRecipe {
        self.seed_recipe(
            "Butter Chicken",
            4,
            &[("Chicken Breast", dec!(280), dec!(0.8))],
        )
        .await
    }

    /// Chana curry for 2: chickpeas 48 + tomatoes 18 + cream 62 = 128.00
    pub async fn seed_curry(&self) -> SeededRecipe {
        self.seed_recipe(
            "Chana Curry",
            2,
            &[
                ("Chickpeas", dec!(120), dec!(0.4)),
                ("Tomatoes", dec!(60), dec!(0.3)),
                ("Cream", dec!(310), dec!(0.2)),
            ],
        )
        .await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}

/// Parses a decimal rendered either as a JSON string or number
pub fn json_decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected decimal, got {}", other),
    }
}
