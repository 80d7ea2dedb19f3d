//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Catalog, Product, ProductVariant};
pub use order::{Checkout, CheckoutStatus, Order, OrderError};
pub use cart::{Basket, BasketLine, PersistedLine};
