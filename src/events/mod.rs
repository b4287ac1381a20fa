use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Domain operations have already committed by the time they publish.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events published after a successful commit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    CartCreated {
        cart_id: Uuid,
        user_id: String,
    },
    CartItemAdded {
        cart_id: Uuid,
        item_id: Uuid,
        recipe_id: Uuid,
    },
    CartItemUpdated {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartItemRemoved {
        cart_id: Uuid,
        item_id: Uuid,
    },
    PaymentInitiated {
        reference: String,
        amount: Decimal,
    },
    OrderPlaced {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
        paid: bool,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
}

/// Drains the event channel, logging each event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced {
                order_id,
                order_number,
                total,
                paid,
            } => {
                info!(%order_id, %order_number, %total, paid, "order placed");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::PaymentInitiated { reference, amount } => {
                info!(%reference, %amount, "payment initiated");
            }
            other => info!(event = ?other, "cart event"),
        }
    }

    info!("Event processing loop stopped");
}
