/// Storefront API handlers
pub mod carts;
pub mod checkout;
pub mod recipes;

// Re-export route builders
pub use carts::carts_routes;
pub use checkout::checkout_routes;
pub use recipes::recipes_routes;
