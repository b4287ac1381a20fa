// Storefront services: pricing, catalog, cart, checkout and orders
pub mod commerce;
