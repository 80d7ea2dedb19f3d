//! Storefront Tagging
//!
//! Demo storefront showing consent management and ecommerce event tagging
//! through a tag manager data layer.
//!
//! ## Features
//! - Static product catalog with variants
//! - Cookie-persisted basket with cart-changed notifications
//! - Consent categories with default/update signalling
//! - GA4-style ecommerce events and an on-page event log
//! - JSON API standing in for the storefront's page controllers

pub mod config;
pub mod domain;
pub mod http;
pub mod services;
pub mod storage;

use thiserror::Error;
use crate::domain::aggregates::OrderError;
use crate::domain::value_objects::SkuError;

pub use config::Config;
pub use domain::aggregates::{Basket, BasketLine, Catalog, Order, Product, ProductVariant};
pub use domain::events::{EcommerceEvent, EcommerceEventName, EventFormatter, Promotion, PromotionContext};
pub use domain::value_objects::{Consent, ConsentCategory, ConsentStatus, ConsentUpdate, Currency, Sku};
pub use services::{BasketStore, ConsentStore, DataLayer, EventTracker, TagSink};
pub use storage::{KeyValueStore, MemoryStore};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Variant {sku} not found for product {product_id}")]
    VariantNotFound { product_id: String, sku: String },

    #[error("Default variant {sku} missing from product {product_id}")]
    DanglingDefaultVariant { product_id: String, sku: String },

    #[error("Duplicate product: {0}")]
    DuplicateProduct(String),

    #[error("Duplicate SKU: {0}")]
    DuplicateSku(String),

    #[error("Negative price for SKU {0}")]
    NegativePrice(String),

    #[error("Invalid SKU: {0}")]
    InvalidSku(#[from] SkuError),

    #[error("Checkout failed: {0}")]
    Checkout(#[from] OrderError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
