pub mod commerce;
pub mod order;
pub mod order_item;
pub mod payment_intent;

pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment_intent::{Entity as PaymentIntent, Model as PaymentIntentModel, PaymentIntentStatus};
