//! Tag sink: the boundary to the tag manager's data layer.
//!
//! Every ecommerce event is sent as two pushes, `{ecommerce: null}` and then
//! the event itself, so fields from the previous event never leak into the
//! next one. Sends are fire-and-forget.

use serde_json::{json, Value};
use tracing::{debug, warn};
use crate::domain::aggregates::{Basket, Catalog, Order, Product, ProductVariant};
use crate::domain::events::{EcommerceEvent, EventFormatter, Promotion, PromotionContext};
use crate::domain::value_objects::{Consent, ConsentUpdate};

pub trait TagSink {
    /// Push one object onto the data layer.
    fn push(&mut self, entry: Value);

    /// Consent command, pushed the way `gtag('consent', kind, values)` does.
    fn consent(&mut self, update: ConsentUpdate, consent: &Consent) {
        self.push(json!(["consent", update, consent]));
    }
}

impl<T: TagSink + ?Sized> TagSink for &mut T {
    fn push(&mut self, entry: Value) { (**self).push(entry) }
    fn consent(&mut self, update: ConsentUpdate, consent: &Consent) { (**self).consent(update, consent) }
}

/// Records pushes in order. The HTTP layer hands these to the browser to
/// replay into the real tag manager.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataLayer {
    entries: Vec<Value>,
}

impl DataLayer {
    pub fn new() -> Self { Self::default() }
    pub fn entries(&self) -> &[Value] { &self.entries }
    pub fn into_entries(self) -> Vec<Value> { self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Kinds of the consent commands pushed so far, in order.
    pub fn consent_commands(&self) -> Vec<ConsentUpdate> {
        self.entries.iter()
            .filter(|e| e.get(0).and_then(Value::as_str) == Some("consent"))
            .filter_map(|e| e.get(1).cloned())
            .filter_map(|kind| serde_json::from_value(kind).ok())
            .collect()
    }
}

impl TagSink for DataLayer {
    fn push(&mut self, entry: Value) { self.entries.push(entry); }
}

/// Pretty-printed events, most recent first. Grows for the whole session.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    entries: Vec<String>,
}

impl EventLog {
    pub fn new() -> Self { Self::default() }
    pub fn entries(&self) -> &[String] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Fold in entries logged since this log was taken; they are newer, so
    /// they go in front.
    pub fn absorb(&mut self, newer: EventLog) {
        self.entries.splice(0..0, newer.entries);
    }

    fn record(&mut self, event: &Value) {
        match serde_json::to_string_pretty(event) {
            Ok(text) => self.entries.insert(0, text),
            Err(e) => warn!(error = %e, "could not format event for the event log"),
        }
    }
}

/// Formats events and forwards them to a [`TagSink`], keeping an [`EventLog`].
pub struct EventTracker<T> {
    formatter: EventFormatter,
    sink: T,
    log: EventLog,
}

impl<T: TagSink> EventTracker<T> {
    pub fn new(formatter: EventFormatter, sink: T) -> Self { Self { formatter, sink, log: EventLog::new() } }

    pub fn formatter(&self) -> &EventFormatter { &self.formatter }
    pub fn log(&self) -> &EventLog { &self.log }
    pub fn sink(&self) -> &T { &self.sink }
    pub fn into_log(self) -> EventLog { self.log }

    pub fn send(&mut self, event: EcommerceEvent) {
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => { warn!(event = %event.event, error = %e, "dropping unserializable ecommerce event"); return; }
        };
        debug!(event = %event.event, items = event.ecommerce.items.len(), "generated ecommerce event");
        self.sink.push(json!({ "ecommerce": null }));
        self.sink.push(payload.clone());
        self.log.record(&payload);
    }

    pub fn send_view_item_list(&mut self, catalog: &Catalog) {
        let event = self.formatter.view_item_list(catalog);
        self.send(event);
    }

    pub fn send_view_item(&mut self, product: &Product, variant: &ProductVariant, promotion: Option<&PromotionContext>) {
        let event = self.formatter.view_item(product, variant, promotion);
        self.send(event);
    }

    pub fn send_select_item(&mut self, product: &Product, variant: &ProductVariant, promotion: Option<&PromotionContext>) {
        let event = self.formatter.select_item(product, variant, promotion);
        self.send(event);
    }

    pub fn send_add_to_cart(&mut self, product: &Product, variant: &ProductVariant, quantity: u32, promotion: Option<&PromotionContext>) {
        let event = self.formatter.add_to_cart(product, variant, quantity, promotion);
        self.send(event);
    }

    /// `quantity` is the positive number of units removed.
    pub fn send_remove_from_cart(&mut self, product: &Product, variant: &ProductVariant, quantity: u32) {
        let event = self.formatter.remove_from_cart(product, variant, quantity);
        self.send(event);
    }

    pub fn send_begin_checkout(&mut self, basket: &Basket) {
        let event = self.formatter.begin_checkout(basket);
        self.send(event);
    }

    pub fn send_add_shipping_info(&mut self, basket: &Basket, shipping_tier: &str) {
        let event = self.formatter.add_shipping_info(basket, shipping_tier);
        self.send(event);
    }

    pub fn send_add_payment_info(&mut self, basket: &Basket, payment_type: &str) {
        let event = self.formatter.add_payment_info(basket, payment_type);
        self.send(event);
    }

    pub fn send_purchase(&mut self, order: &Order) {
        let event = self.formatter.purchase(order);
        self.send(event);
    }

    pub fn send_view_promotion(&mut self, product: &Product, variant: &ProductVariant, promotion: &Promotion) {
        let event = self.formatter.view_promotion(product, variant, promotion);
        self.send(event);
    }

    /// Returns the context to pass into the next item events for this product.
    pub fn send_select_promotion(&mut self, product: &Product, variant: &ProductVariant, promotion: Promotion) -> PromotionContext {
        let event = self.formatter.select_promotion(product, variant, &promotion);
        self.send(event);
        PromotionContext::new(product.id(), promotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> EventTracker<DataLayer> { EventTracker::new(EventFormatter::default(), DataLayer::new()) }

    #[test]
    fn test_send_clears_before_each_event() {
        let catalog = Catalog::demo();
        let mut tracker = tracker();
        tracker.send_view_item_list(&catalog);
        let (product, variant) = catalog.variant("tshirt", "tshirt_s").unwrap();
        tracker.send_view_item(product, variant, None);

        let entries = tracker.sink().entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], json!({ "ecommerce": null }));
        assert_eq!(entries[1]["event"], "view_item_list");
        assert_eq!(entries[2], json!({ "ecommerce": null }));
        assert_eq!(entries[3]["event"], "view_item");
    }

    #[test]
    fn test_log_is_most_recent_first() {
        let catalog = Catalog::demo();
        let mut tracker = tracker();
        let (product, variant) = catalog.variant("shoes", "shoes_4").unwrap();
        tracker.send_add_to_cart(product, variant, 1, None);
        tracker.send_remove_from_cart(product, variant, 1);
        let log = tracker.log();
        assert_eq!(log.len(), 2);
        assert!(log.entries()[0].contains("\"remove_from_cart\""));
        assert!(log.entries()[1].contains("\"add_to_cart\""));
        assert!(log.entries()[0].contains("\n  \"ecommerce\""));
    }

    #[test]
    fn test_absorb_puts_newer_first() {
        let catalog = Catalog::demo();
        let (product, variant) = catalog.variant("tshirt", "tshirt_l").unwrap();
        let mut first = tracker();
        first.send_view_item(product, variant, None);
        let mut session = first.into_log();
        let mut second = tracker();
        second.send_add_to_cart(product, variant, 1, None);
        second.send_begin_checkout(&Basket::default());
        session.absorb(second.into_log());
        assert_eq!(session.len(), 3);
        assert!(session.entries()[0].contains("\"begin_checkout\""));
        assert!(session.entries()[2].contains("\"view_item\""));
    }

    #[test]
    fn test_select_promotion_returns_context() {
        let catalog = Catalog::demo();
        let mut tracker = tracker();
        let product = catalog.product("blazer").unwrap();
        let promotion = Promotion {
            promotion_id: "p1".into(), promotion_name: "Blazers".into(),
            creative_name: "banner".into(), creative_slot: "top".into(),
        };
        let ctx = tracker.send_select_promotion(product, product.default_variant(), promotion);
        assert_eq!(ctx.product_id, "blazer");
        tracker.send_add_to_cart(product, product.default_variant(), 1, Some(&ctx));
        let last = &tracker.sink().entries()[3];
        assert_eq!(last["ecommerce"]["items"][0]["promotion_id"], "p1");
    }

    #[test]
    fn test_consent_command_shape() {
        let mut layer = DataLayer::new();
        layer.consent(ConsentUpdate::Default, &Consent::denied_all());
        assert_eq!(layer.entries()[0][0], "consent");
        assert_eq!(layer.entries()[0][1], "default");
        assert_eq!(layer.entries()[0][2]["ad_storage"], "denied");
        assert_eq!(layer.consent_commands(), vec![ConsentUpdate::Default]);
    }

    #[test]
    fn test_tracker_over_borrowed_sink() {
        let mut layer = DataLayer::new();
        {
            let mut tracker = EventTracker::new(EventFormatter::default(), &mut layer);
            tracker.send_view_item_list(&Catalog::demo());
        }
        assert_eq!(layer.len(), 2);
    }
}
