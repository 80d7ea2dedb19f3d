//! Stateful services over the domain: basket and consent persistence and the tag sink.
pub mod basket;
pub mod consent;
pub mod tagging;

pub use basket::{BasketStore, CartChanged, CartNotifier, SubscriptionId, TotalPrice, BASKET_COOKIE};
pub use consent::{ConsentStore, CONSENT_COOKIE};
pub use tagging::{DataLayer, EventLog, EventTracker, TagSink};
