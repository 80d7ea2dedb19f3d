//! Page-controller endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use validator::Validate;
use crate::domain::aggregates::{Basket, Checkout, Order, Product, ProductVariant};
use crate::domain::events::{Promotion, PromotionContext};
use crate::domain::value_objects::{Consent, Currency};
use crate::services::ConsentStore;
use super::{invalid, reject, AppState, Visit};

type ApiResult = Result<Response, (StatusCode, String)>;

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Serialize)]
pub struct BasketView {
    pub lines: Vec<BasketLineView>,
    pub line_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: rust_decimal::Decimal,
    pub total_formatted: String,
}

#[derive(Debug, Serialize)]
pub struct BasketLineView {
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub display_name: String,
    pub size: String,
    pub image: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

impl BasketView {
    pub fn new(basket: &Basket, currency: &Currency) -> Self {
        let lines = basket.lines().map(|l| BasketLineView {
            product_id: l.product.id().to_string(),
            product_name: l.product.name().to_string(),
            sku: l.variant.sku.to_string(),
            display_name: l.variant.display_name.clone(),
            size: l.variant.size.clone(),
            image: l.variant.image.clone(),
            quantity: l.quantity.value(),
            unit_price: currency.format(l.variant.price),
            line_total: currency.format(l.line_total()),
        }).collect();
        Self { lines, line_count: basket.len(), total: basket.total(), total_formatted: currency.format(basket.total()) }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductView<'a> {
    #[serde(flatten)]
    pub product: &'a Product,
    pub price: String,
}

#[derive(Debug, Serialize)]
pub struct ProductDetailView<'a> {
    #[serde(flatten)]
    pub product: &'a Product,
    pub selected: &'a ProductVariant,
    pub price: String,
}

#[derive(Debug, Serialize)]
struct SessionView {
    visitor_id: String,
    gtm_container_id: Option<String>,
    currency: String,
    has_stored_consent: bool,
    consent: Consent,
    basket: BasketView,
}

#[derive(Debug, Serialize)]
struct ConsentView { has_stored_consent: bool, consent: Consent }

#[derive(Debug, Serialize)]
struct BasketUpdateView { basket: BasketView, cart_changed: bool }

#[derive(Debug, Serialize)]
struct OrderView {
    transaction_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    value: rust_decimal::Decimal,
    value_formatted: String,
    shipping_tier: Option<String>,
    payment_type: Option<String>,
    basket: BasketView,
}

impl OrderView {
    fn new(order: &Order, currency: &Currency) -> Self {
        Self {
            transaction_id: order.transaction_id().to_string(), value: order.value(),
            value_formatted: currency.format(order.value()),
            shipping_tier: order.shipping_tier().map(str::to_string), payment_type: order.payment_type().map(str::to_string),
            basket: BasketView::new(order.basket(), currency),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)] pub struct VariantQuery { pub variant: Option<String> }

#[derive(Debug, Default, Deserialize)]
pub struct SelectItemRequest { pub variant: Option<String>, pub promotion: Option<PromotionContext> }

#[derive(Debug, Deserialize, Validate)]
pub struct PromotionRequest {
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    pub variant_sku: Option<String>,
    #[serde(flatten)]
    pub promotion: Promotion,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBasketRequest {
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    #[validate(length(min = 1, max = 50))]
    pub variant_sku: String,
    #[validate(range(min = -999, max = 999))]
    pub quantity_delta: i64,
    pub promotion: Option<PromotionContext>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingRequest { #[validate(length(min = 1, max = 64))] pub shipping_tier: String }

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest { #[validate(length(min = 1, max = 64))] pub payment_type: String }

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteRequest {
    #[validate(length(min = 1, max = 64))]
    pub shipping_tier: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub payment_type: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy", "service": "storefront-tagging"}))
}

/// Page load: consent initialization and the basket badge.
pub async fn session(State(s): State<AppState>, headers: HeaderMap) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    let consent = ConsentStore::initialize(&mut visit.jar, &mut visit.layer).with_expiry(s.config.cookie_expiry());
    let (has_stored_consent, current) = (consent.has_stored_consent(), consent.current());
    drop(consent);
    let basket = BasketView::new(s.basket_store(&mut visit.jar).get(), &s.config.currency);
    let view = SessionView {
        visitor_id: visit.visitor_id.clone(), gtm_container_id: s.config.gtm_container_id.clone(),
        currency: s.config.currency.code().to_string(), has_stored_consent, consent: current, basket,
    };
    Ok(visit.respond(view))
}

pub async fn update_consent(State(s): State<AppState>, headers: HeaderMap, Json(consent): Json<Consent>) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    let mut store = ConsentStore::resume(&mut visit.jar, &mut visit.layer).with_expiry(s.config.cookie_expiry());
    store.set_current(consent);
    let view = ConsentView { has_stored_consent: store.has_stored_consent(), consent: store.current() };
    drop(store);
    Ok(visit.respond(view))
}

pub async fn list_products(State(s): State<AppState>, headers: HeaderMap) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_view_item_list(&s.catalog));
    let products: Vec<_> = s.catalog.products()
        .map(|p| ProductView { product: p, price: p.default_price_formatted(&s.config.currency) })
        .collect();
    Ok(visit.respond(products))
}

pub async fn get_product(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<String>, Query(q): Query<VariantQuery>) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    let (product, variant) = resolve(&s, &id, q.variant.as_deref())?;
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_view_item(product, variant, None));
    Ok(visit.respond(ProductDetailView { product, selected: variant, price: s.config.currency.format(variant.price) }))
}

pub async fn select_product(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<String>, Json(r): Json<SelectItemRequest>) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    let (product, variant) = resolve(&s, &id, r.variant.as_deref())?;
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_select_item(product, variant, r.promotion.as_ref()));
    Ok(visit.respond(ProductDetailView { product, selected: variant, price: s.config.currency.format(variant.price) }))
}

pub async fn view_promotion(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<PromotionRequest>) -> ApiResult {
    r.validate().map_err(invalid)?;
    let mut visit = Visit::begin(&s, &headers);
    let (product, variant) = resolve(&s, &r.product_id, r.variant_sku.as_deref())?;
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_view_promotion(product, variant, &r.promotion));
    Ok(visit.respond(r.promotion))
}

/// Returns the promotion context the client passes back on its next item events.
pub async fn select_promotion(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<PromotionRequest>) -> ApiResult {
    r.validate().map_err(invalid)?;
    let mut visit = Visit::begin(&s, &headers);
    let (product, variant) = resolve(&s, &r.product_id, r.variant_sku.as_deref())?;
    let context = s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_select_promotion(product, variant, r.promotion));
    Ok(visit.respond(context))
}

pub async fn get_basket(State(s): State<AppState>, headers: HeaderMap) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    let view = BasketView::new(s.basket_store(&mut visit.jar).get(), &s.config.currency);
    Ok(visit.respond(view))
}

pub async fn update_basket(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<UpdateBasketRequest>) -> ApiResult {
    r.validate().map_err(invalid)?;
    let mut visit = Visit::begin(&s, &headers);
    let changed = Arc::new(AtomicBool::new(false));
    let mut store = s.basket_store(&mut visit.jar);
    let flag = Arc::clone(&changed);
    store.subscribe(move |change| {
        flag.store(true, Ordering::SeqCst);
        info!(sku = %change.sku, quantity = change.quantity, lines = change.line_count, "cart changed");
    });
    store.update(&r.product_id, &r.variant_sku, r.quantity_delta).map_err(reject)?;
    let basket = BasketView::new(store.get(), &s.config.currency);
    drop(store);

    if r.quantity_delta != 0 {
        let (product, variant) = s.catalog.variant(&r.product_id, &r.variant_sku).map_err(reject)?;
        let quantity = u32::try_from(r.quantity_delta.unsigned_abs()).unwrap_or(u32::MAX);
        s.track(&visit.visitor_id, &mut visit.layer, |t| {
            if r.quantity_delta > 0 {
                t.send_add_to_cart(product, variant, quantity, r.promotion.as_ref());
            } else {
                t.send_remove_from_cart(product, variant, quantity);
            }
        });
    }
    Ok(visit.respond(BasketUpdateView { basket, cart_changed: changed.load(Ordering::SeqCst) }))
}

pub async fn clear_basket(State(s): State<AppState>, headers: HeaderMap) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    let mut store = s.basket_store(&mut visit.jar);
    store.clear();
    let view = BasketView::new(store.basket(), &s.config.currency);
    drop(store);
    Ok(visit.respond(view))
}

pub async fn begin_checkout(State(s): State<AppState>, headers: HeaderMap) -> ApiResult {
    let mut visit = Visit::begin(&s, &headers);
    let checkout = Checkout::begin(s.basket_store(&mut visit.jar).get().clone()).map_err(|e| reject(e.into()))?;
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_begin_checkout(checkout.basket()));
    let view = BasketView::new(checkout.basket(), &s.config.currency);
    Ok(visit.respond(view))
}

pub async fn add_shipping(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<ShippingRequest>) -> ApiResult {
    r.validate().map_err(invalid)?;
    let mut visit = Visit::begin(&s, &headers);
    let mut checkout = Checkout::begin(s.basket_store(&mut visit.jar).get().clone()).map_err(|e| reject(e.into()))?;
    checkout.add_shipping(r.shipping_tier.as_str()).map_err(|e| reject(e.into()))?;
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_add_shipping_info(checkout.basket(), &r.shipping_tier));
    let view = BasketView::new(checkout.basket(), &s.config.currency);
    Ok(visit.respond(view))
}

pub async fn add_payment(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<PaymentRequest>) -> ApiResult {
    r.validate().map_err(invalid)?;
    let mut visit = Visit::begin(&s, &headers);
    let mut checkout = Checkout::begin(s.basket_store(&mut visit.jar).get().clone()).map_err(|e| reject(e.into()))?;
    checkout.add_payment(r.payment_type.as_str()).map_err(|e| reject(e.into()))?;
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_add_payment_info(checkout.basket(), &r.payment_type));
    let view = BasketView::new(checkout.basket(), &s.config.currency);
    Ok(visit.respond(view))
}

/// Places the order, clears the basket cookie, then tags the purchase from the
/// order's own snapshot of the basket.
pub async fn complete_checkout(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<CompleteRequest>) -> ApiResult {
    r.validate().map_err(invalid)?;
    let mut visit = Visit::begin(&s, &headers);
    let mut store = s.basket_store(&mut visit.jar);
    let mut checkout = Checkout::begin(store.get().clone()).map_err(|e| reject(e.into()))?;
    if let Some(tier) = r.shipping_tier { checkout.add_shipping(tier).map_err(|e| reject(e.into()))?; }
    if let Some(payment) = r.payment_type { checkout.add_payment(payment).map_err(|e| reject(e.into()))?; }
    let order = checkout.place();
    store.clear();
    drop(store);
    info!(transaction_id = order.transaction_id(), value = %order.value(), "order placed");
    s.track(&visit.visitor_id, &mut visit.layer, |t| t.send_purchase(&order));
    Ok(visit.respond(OrderView::new(&order, &s.config.currency)))
}

pub async fn list_events(State(s): State<AppState>, headers: HeaderMap) -> ApiResult {
    let visit = Visit::begin(&s, &headers);
    let events = s.events_for(&visit.visitor_id);
    Ok(visit.respond(events))
}

fn resolve<'a>(s: &'a AppState, product_id: &str, sku: Option<&str>) -> Result<(&'a Product, &'a ProductVariant), (StatusCode, String)> {
    let product = s.catalog.product(product_id).map_err(reject)?;
    match sku {
        Some(sku) => s.catalog.variant(product_id, sku).map(|(p, v)| (p.as_ref(), v)).map_err(reject),
        None => Ok((product.as_ref(), product.default_variant())),
    }
}
