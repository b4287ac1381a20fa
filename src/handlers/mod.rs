pub mod commerce;
pub mod common;
pub mod orders;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::commerce::{
        CartService, CatalogService, CheckoutService, HmacPaymentGateway, OrderService,
        PaymentGateway,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, warn};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    /// Builds the services, wiring the payment gateway from configuration.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        let gateway: Option<Arc<dyn PaymentGateway>> = match config.payment_credentials() {
            Some((key_id, key_secret)) => {
                info!("Payment gateway enabled with key {}", key_id);
                Some(Arc::new(HmacPaymentGateway::new(key_id, key_secret)))
            }
            None => {
                warn!("Payment credentials not configured; online payment disabled");
                None
            }
        };
        Self::with_gateway(db, event_sender, config, gateway)
    }

    /// Builds the services with an explicit gateway (or none).
    pub fn with_gateway(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                config,
                gateway,
            )),
            orders: Arc::new(OrderService::new(db, event_sender)),
        }
    }
}
