//! Storefront domain: catalog, basket, checkout and the ecommerce events they produce.
pub mod aggregates;
pub mod events;
pub mod value_objects;
