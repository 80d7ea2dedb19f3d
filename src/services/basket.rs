//! Basket store: the visitor's basket, persisted to a cookie.
//!
//! Storage is the source of truth across page loads, so every read and every
//! update starts from what is persisted. Last write wins when two tabs race.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::domain::aggregates::{Basket, BasketLine, Catalog, PersistedLine};
use crate::domain::value_objects::Currency;
use crate::storage::{default_expiry, KeyValueStore};
use crate::Result;

pub const BASKET_COOKIE: &str = "basket-cookie";

/// Published after a basket update that added units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartChanged {
    pub sku: String,
    pub delta: i64,
    /// Quantity of the line after the update.
    pub quantity: u32,
    pub line_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&CartChanged) + Send>;

#[derive(Default)]
pub struct CartNotifier {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl CartNotifier {
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where F: FnMut(&CartChanged) + Send + 'static {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize { self.listeners.len() }
    pub fn is_empty(&self) -> bool { self.listeners.is_empty() }

    fn publish(&mut self, change: &CartChanged) {
        for (_, listener) in self.listeners.iter_mut() { listener(change); }
    }
}

impl fmt::Debug for CartNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartNotifier").field("listeners", &self.listeners.len()).finish()
    }
}

/// A price either as a raw amount or formatted in the store currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TotalPrice {
    #[serde(with = "rust_decimal::serde::float")]
    Amount(Decimal),
    Formatted(String),
}

impl TotalPrice {
    pub fn amount(&self) -> Option<Decimal> { match self { Self::Amount(a) => Some(*a), Self::Formatted(_) => None } }
}

impl fmt::Display for TotalPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Amount(a) => write!(f, "{a}"), Self::Formatted(s) => f.write_str(s) }
    }
}

pub struct BasketStore<S> {
    catalog: Arc<Catalog>,
    storage: S,
    currency: Currency,
    expiry: Duration,
    basket: Basket,
    notifier: CartNotifier,
}

impl<S: KeyValueStore> BasketStore<S> {
    pub fn new(catalog: Arc<Catalog>, storage: S) -> Self {
        let mut store = Self {
            catalog, storage, currency: Currency::default(), expiry: default_expiry(),
            basket: Basket::new(), notifier: CartNotifier::default(),
        };
        store.basket = store.load();
        store
    }

    pub fn with_currency(mut self, currency: Currency) -> Self { self.currency = currency; self }
    pub fn with_expiry(mut self, expiry: Duration) -> Self { self.expiry = expiry; self }

    /// Current basket, re-read from storage first.
    pub fn get(&mut self) -> &Basket {
        self.basket = self.load();
        &self.basket
    }

    /// In-memory basket as of the last read or write.
    pub fn basket(&self) -> &Basket { &self.basket }

    /// Apply a signed quantity change to one variant.
    ///
    /// A zero delta does nothing. Lines that fall to zero or below are removed.
    /// Subscribers are notified after the write when units were added.
    pub fn update(&mut self, product_id: &str, variant_sku: &str, delta: i64) -> Result<()> {
        if delta == 0 { return Ok(()); }
        let catalog = Arc::clone(&self.catalog);
        let (product, variant) = catalog.variant(product_id, variant_sku)?;

        let mut basket = self.load();
        let quantity = basket.apply_delta(product, variant, delta).map(|l| l.quantity.value()).unwrap_or(0);
        self.persist(&basket);
        self.basket = basket;
        debug!(sku = variant_sku, delta, quantity, "basket updated");

        if delta > 0 {
            let change = CartChanged { sku: variant_sku.to_string(), delta, quantity, line_count: self.basket.len() };
            self.notifier.publish(&change);
        }
        Ok(())
    }

    pub fn total_price(&self, as_currency: bool) -> TotalPrice { self.price(self.basket.total(), as_currency) }

    pub fn line_price(&self, line: &BasketLine, as_currency: bool) -> TotalPrice { self.price(line.line_total(), as_currency) }

    fn price(&self, amount: Decimal, as_currency: bool) -> TotalPrice {
        if as_currency { TotalPrice::Formatted(self.currency.format(amount)) } else { TotalPrice::Amount(amount) }
    }

    /// Empty the basket and delete the cookie. Returns what was in memory.
    pub fn clear(&mut self) -> Basket {
        self.storage.remove(BASKET_COOKIE);
        std::mem::take(&mut self.basket)
    }

    pub fn is_empty(&self) -> bool { self.basket.is_empty() }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where F: FnMut(&CartChanged) + Send + 'static {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool { self.notifier.unsubscribe(id) }

    pub fn into_storage(self) -> S { self.storage }

    fn load(&self) -> Basket {
        let Some(text) = self.storage.get(BASKET_COOKIE).filter(|t| !t.is_empty()) else { return Basket::new() };
        let lines: Vec<PersistedLine> = match serde_json::from_str(&text) {
            Ok(lines) => lines,
            Err(e) => { warn!(error = %e, "discarding unparseable basket cookie"); return Basket::new(); }
        };
        Basket::from_persisted(&lines, &self.catalog).unwrap_or_else(|e| {
            warn!(error = %e, "discarding basket cookie with unknown catalog references");
            Basket::new()
        })
    }

    fn persist(&mut self, basket: &Basket) {
        match serde_json::to_string(&basket.to_persisted()) {
            Ok(text) => self.storage.set(BASKET_COOKIE, text, self.expiry),
            Err(e) => warn!(error = %e, "could not serialize basket"),
        }
    }
}
