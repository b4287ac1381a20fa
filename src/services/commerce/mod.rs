/// Storefront services: catalog, pricing, cart, checkout and orders
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod order_service;
pub mod payment_gateway;
pub mod pricing_service;

// Re-export services for convenience
pub use cart_service::{
    AddToCartInput, CartItemView, CartService, CartView, UpdateCartItemInput, MAX_ITEM_QUANTITY,
};
pub use catalog_service::{
    AddRecipeIngredientInput, CatalogService, CreateCategoryInput, CreateIngredientInput,
    CreateRecipeInput, PriceQuote, RecipeDetail, RecipeListQuery, RecipeListResult,
};
pub use checkout_service::{
    Charges, ChargesPolicy, CheckoutService, Delivery, DeliveryDetails, PaymentSession,
};
pub use order_service::{OrderDetail, OrderListQuery, OrderListResult, OrderService};
pub use payment_gateway::{
    HmacPaymentGateway, PayableOrder, PaymentConfirmation, PaymentGateway, VerifiedPayment,
};
pub use pricing_service::{PriceBreakdown, PricedRecipe, MIN_LINE_PRICE};
