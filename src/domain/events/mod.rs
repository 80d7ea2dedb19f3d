//! Ecommerce events
//!
//! Payloads follow the tag manager's GA4 ecommerce schema. Formatting is pure:
//! building an event never touches the data layer or the basket cookie.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::domain::aggregates::{Basket, Catalog, Order, Product, ProductVariant};
use crate::domain::value_objects::Currency;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcommerceEventName {
    ViewItemList,
    ViewItem,
    SelectItem,
    AddToCart,
    RemoveFromCart,
    BeginCheckout,
    AddShippingInfo,
    AddPaymentInfo,
    Purchase,
    ViewPromotion,
    SelectPromotion,
}

impl EcommerceEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewItemList => "view_item_list",
            Self::ViewItem => "view_item",
            Self::SelectItem => "select_item",
            Self::AddToCart => "add_to_cart",
            Self::RemoveFromCart => "remove_from_cart",
            Self::BeginCheckout => "begin_checkout",
            Self::AddShippingInfo => "add_shipping_info",
            Self::AddPaymentInfo => "add_payment_info",
            Self::Purchase => "purchase",
            Self::ViewPromotion => "view_promotion",
            Self::SelectPromotion => "select_promotion",
        }
    }

    /// Events that carry `currency` and `value`.
    pub fn is_monetary(&self) -> bool {
        !matches!(self, Self::ViewItemList | Self::SelectItem | Self::ViewPromotion | Self::SelectPromotion)
    }
}

impl fmt::Display for EcommerceEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub promotion_id: String,
    pub promotion_name: String,
    pub creative_name: String,
    pub creative_slot: String,
}

/// The promotion a visitor clicked, scoped to the product it promoted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionContext {
    pub product_id: String,
    #[serde(flatten)]
    pub promotion: Promotion,
}

impl PromotionContext {
    pub fn new(product_id: impl Into<String>, promotion: Promotion) -> Self {
        Self { product_id: product_id.into(), promotion }
    }
    pub fn applies_to(&self, product: &Product) -> bool { self.product_id == product.id() }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Item {
    pub item_id: String,
    pub item_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    pub item_variant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_color: Option<String>,
    pub location_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_slot: Option<String>,
}

impl Item {
    fn with_promotion(mut self, promotion: &Promotion) -> Self {
        self.promotion_id = Some(promotion.promotion_id.clone());
        self.promotion_name = Some(promotion.promotion_name.clone());
        self.creative_name = Some(promotion.creative_name.clone());
        self.creative_slot = Some(promotion.creative_slot.clone());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EcommercePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EcommerceEvent {
    pub event: EcommerceEventName,
    pub ecommerce: EcommercePayload,
}

/// Builds ecommerce events in the store currency.
#[derive(Clone, Debug, Default)]
pub struct EventFormatter {
    currency: Currency,
}

impl EventFormatter {
    pub fn new(currency: Currency) -> Self { Self { currency } }
    pub fn currency(&self) -> &Currency { &self.currency }

    /// One line item. Promotion fields are only filled when the context
    /// belongs to this product.
    pub fn item(&self, product: &Product, variant: &ProductVariant, quantity: u32, promotion: Option<&PromotionContext>) -> Item {
        let mut categories = product.categories().iter().take(5).cloned();
        let item = Item {
            item_id: variant.sku.to_string(),
            item_name: product.name().to_string(),
            price: variant.price,
            quantity,
            item_variant: variant.name.clone(),
            item_brand: product.brand().map(str::to_string),
            item_category: categories.next(),
            item_category2: categories.next(),
            item_category3: categories.next(),
            item_category4: categories.next(),
            item_category5: categories.next(),
            item_color: variant.color.clone(),
            location_id: format!("loc_{}", product.id().to_uppercase().chars().take(3).collect::<String>()),
            promotion_id: None,
            promotion_name: None,
            creative_name: None,
            creative_slot: None,
        };
        match promotion {
            Some(ctx) if ctx.applies_to(product) => item.with_promotion(&ctx.promotion),
            _ => item,
        }
    }

    pub fn items_from_basket(&self, basket: &Basket) -> Vec<Item> {
        basket.lines().map(|l| self.item(&l.product, &l.variant, l.quantity.value(), None)).collect()
    }

    fn monetary(&self, value: Decimal, items: Vec<Item>) -> EcommercePayload {
        EcommercePayload { currency: Some(self.currency.code().to_string()), value: Some(value), items, ..Default::default() }
    }

    pub fn view_item_list(&self, catalog: &Catalog) -> EcommerceEvent {
        let items = catalog.products().map(|p| self.item(p, p.default_variant(), 1, None)).collect();
        EcommerceEvent { event: EcommerceEventName::ViewItemList, ecommerce: EcommercePayload { items, ..Default::default() } }
    }

    pub fn view_item(&self, product: &Product, variant: &ProductVariant, promotion: Option<&PromotionContext>) -> EcommerceEvent {
        EcommerceEvent {
            event: EcommerceEventName::ViewItem,
            ecommerce: self.monetary(variant.price, vec![self.item(product, variant, 1, promotion)]),
        }
    }

    pub fn select_item(&self, product: &Product, variant: &ProductVariant, promotion: Option<&PromotionContext>) -> EcommerceEvent {
        EcommerceEvent {
            event: EcommerceEventName::SelectItem,
            ecommerce: EcommercePayload { items: vec![self.item(product, variant, 1, promotion)], ..Default::default() },
        }
    }

    pub fn add_to_cart(&self, product: &Product, variant: &ProductVariant, quantity: u32, promotion: Option<&PromotionContext>) -> EcommerceEvent {
        EcommerceEvent {
            event: EcommerceEventName::AddToCart,
            ecommerce: self.monetary(variant.price * Decimal::from(quantity), vec![self.item(product, variant, quantity, promotion)]),
        }
    }

    pub fn remove_from_cart(&self, product: &Product, variant: &ProductVariant, quantity: u32) -> EcommerceEvent {
        EcommerceEvent {
            event: EcommerceEventName::RemoveFromCart,
            ecommerce: self.monetary(variant.price * Decimal::from(quantity), vec![self.item(product, variant, quantity, None)]),
        }
    }

    pub fn begin_checkout(&self, basket: &Basket) -> EcommerceEvent {
        EcommerceEvent { event: EcommerceEventName::BeginCheckout, ecommerce: self.monetary(basket.total(), self.items_from_basket(basket)) }
    }

    pub fn add_shipping_info(&self, basket: &Basket, shipping_tier: &str) -> EcommerceEvent {
        let mut ecommerce = self.monetary(basket.total(), self.items_from_basket(basket));
        ecommerce.shipping_tier = Some(shipping_tier.to_string());
        EcommerceEvent { event: EcommerceEventName::AddShippingInfo, ecommerce }
    }

    pub fn add_payment_info(&self, basket: &Basket, payment_type: &str) -> EcommerceEvent {
        let mut ecommerce = self.monetary(basket.total(), self.items_from_basket(basket));
        ecommerce.payment_type = Some(payment_type.to_string());
        EcommerceEvent { event: EcommerceEventName::AddPaymentInfo, ecommerce }
    }

    pub fn purchase(&self, order: &Order) -> EcommerceEvent {
        let mut ecommerce = self.monetary(order.value(), self.items_from_basket(order.basket()));
        ecommerce.transaction_id = Some(order.transaction_id().to_string());
        ecommerce.shipping_tier = order.shipping_tier().map(str::to_string);
        ecommerce.payment_type = order.payment_type().map(str::to_string);
        EcommerceEvent { event: EcommerceEventName::Purchase, ecommerce }
    }

    pub fn view_promotion(&self, product: &Product, variant: &ProductVariant, promotion: &Promotion) -> EcommerceEvent {
        EcommerceEvent {
            event: EcommerceEventName::ViewPromotion,
            ecommerce: EcommercePayload { items: vec![self.item(product, variant, 1, None).with_promotion(promotion)], ..Default::default() },
        }
    }

    pub fn select_promotion(&self, product: &Product, variant: &ProductVariant, promotion: &Promotion) -> EcommerceEvent {
        EcommerceEvent {
            event: EcommerceEventName::SelectPromotion,
            ecommerce: EcommercePayload { items: vec![self.item(product, variant, 1, None).with_promotion(promotion)], ..Default::default() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Checkout;

    fn promo(product_id: &str) -> PromotionContext {
        PromotionContext::new(product_id, Promotion {
            promotion_id: "summer".into(), promotion_name: "Summer Sale".into(),
            creative_name: "hero".into(), creative_slot: "slot_1".into(),
        })
    }

    #[test]
    fn test_item_fields() {
        let catalog = Catalog::demo();
        let (product, variant) = catalog.variant("shoes", "shoes_6").unwrap();
        let item = EventFormatter::default().item(product, variant, 2, None);
        assert_eq!(item.item_id, "shoes_6");
        assert_eq!(item.item_name, "Shoes");
        assert_eq!(item.item_variant, "shoes#6");
        assert_eq!(item.location_id, "loc_SHO");
        assert_eq!(item.item_category.as_deref(), Some("Footwear"));
        assert!(item.item_category2.is_none());
        assert!(item.promotion_id.is_none());
    }

    #[test]
    fn test_promotion_only_applies_to_its_product() {
        let catalog = Catalog::demo();
        let formatter = EventFormatter::default();
        let ctx = promo("blazer");
        let (blazer, red) = catalog.variant("blazer", "blazer_red_m").unwrap();
        let (tshirt, medium) = catalog.variant("tshirt", "tshirt_m").unwrap();
        assert_eq!(formatter.item(blazer, red, 1, Some(&ctx)).promotion_id.as_deref(), Some("summer"));
        assert!(formatter.item(tshirt, medium, 1, Some(&ctx)).promotion_id.is_none());
    }

    #[test]
    fn test_view_item_list_uses_default_variants() {
        let event = EventFormatter::default().view_item_list(&Catalog::demo());
        assert_eq!(event.event, EcommerceEventName::ViewItemList);
        let skus: Vec<_> = event.ecommerce.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(skus, ["blazer_red_m", "tshirt_m", "shoes_6"]);
        assert!(event.ecommerce.currency.is_none());
    }

    #[test]
    fn test_add_to_cart_payload_json() {
        let catalog = Catalog::demo();
        let (product, variant) = catalog.variant("tshirt", "tshirt_m").unwrap();
        let event = EventFormatter::default().add_to_cart(product, variant, 2, None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "add_to_cart");
        assert_eq!(json["ecommerce"]["currency"], "GBP");
        assert_eq!(json["ecommerce"]["value"], 60.0);
        assert_eq!(json["ecommerce"]["items"][0]["price"], 30.0);
        assert_eq!(json["ecommerce"]["items"][0]["quantity"], 2);
        assert!(json["ecommerce"].get("transaction_id").is_none());
    }

    #[test]
    fn test_purchase_carries_transaction() {
        let catalog = Catalog::demo();
        let (product, variant) = catalog.variant("blazer", "blazer_brown_m").unwrap();
        let mut basket = Basket::new();
        basket.apply_delta(product, variant, 1);
        let mut checkout = Checkout::begin(basket).unwrap();
        checkout.add_payment("Gift Card").unwrap();
        let order = checkout.place();
        let event = EventFormatter::default().purchase(&order);
        assert_eq!(event.ecommerce.transaction_id.as_deref(), Some(order.transaction_id()));
        assert_eq!(event.ecommerce.value, Some(Decimal::new(155, 0)));
        assert_eq!(event.ecommerce.payment_type.as_deref(), Some("Gift Card"));
        assert!(event.ecommerce.shipping_tier.is_none());
    }

    #[test]
    fn test_select_promotion_items() {
        let catalog = Catalog::demo();
        let ctx = promo("shoes");
        let product = catalog.product("shoes").unwrap();
        let event = EventFormatter::default().select_promotion(product, product.default_variant(), &ctx.promotion);
        assert_eq!(event.ecommerce.items[0].creative_slot.as_deref(), Some("slot_1"));
        assert!(!event.event.is_monetary());
    }
}
