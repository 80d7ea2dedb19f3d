//! JSON API for the storefront pages.
//!
//! Each response carries the data layer pushes produced while handling the
//! request; the page replays them into the tag manager in order.

pub mod cookies;
pub mod handlers;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use chrono::{DateTime, Duration, Utc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;
use uuid::Uuid;
use validator::ValidationErrors;
use crate::config::Config;
use crate::domain::aggregates::Catalog;
use crate::domain::events::EventFormatter;
use crate::services::{BasketStore, DataLayer, EventLog, EventTracker};
use crate::storage::KeyValueStore;
use crate::StorefrontError;
use cookies::CookieJar;

pub const VISITOR_COOKIE: &str = "visitor-id";

/// Visitors whose event logs are kept in memory at once.
pub const DEFAULT_VISITOR_LIMIT: usize = 10_000;

struct VisitorLog { log: EventLog, last_seen: DateTime<Utc> }

/// Session event logs keyed by visitor id.
///
/// A log lives as long as the visitor cookie would. Past `limit` visitors the
/// least recently seen ones are dropped.
struct VisitorLogs {
    visitors: HashMap<String, VisitorLog>,
    ttl: Duration,
    limit: usize,
}

impl VisitorLogs {
    fn new(ttl: Duration, limit: usize) -> Self { Self { visitors: HashMap::new(), ttl, limit } }

    fn record(&mut self, visitor_id: &str, sent: EventLog, now: DateTime<Utc>) {
        let entry = self.visitors.entry(visitor_id.to_string())
            .or_insert_with(|| VisitorLog { log: EventLog::new(), last_seen: now });
        entry.log.absorb(sent);
        entry.last_seen = now;
        self.prune(now, visitor_id);
    }

    /// `keep` is the visitor just recorded; it survives the limit.
    fn prune(&mut self, now: DateTime<Utc>, keep: &str) {
        let cutoff = now - self.ttl;
        let before = self.visitors.len();
        self.visitors.retain(|_, v| v.last_seen > cutoff);
        while self.visitors.len() > self.limit {
            let oldest = self.visitors.iter()
                .filter(|(id, _)| id.as_str() != keep)
                .min_by_key(|(_, v)| v.last_seen)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else { break };
            self.visitors.remove(&oldest);
        }
        let dropped = before - self.visitors.len();
        if dropped > 0 { debug!(dropped, remaining = self.visitors.len(), "pruned visitor event logs"); }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub config: Arc<Config>,
    event_logs: Arc<Mutex<VisitorLogs>>,
}

impl AppState {
    pub fn new(config: Config, catalog: Catalog) -> Self {
        let logs = VisitorLogs::new(config.cookie_expiry(), DEFAULT_VISITOR_LIMIT);
        Self { catalog: Arc::new(catalog), config: Arc::new(config), event_logs: Arc::new(Mutex::new(logs)) }
    }

    pub fn with_visitor_limit(self, limit: usize) -> Self {
        self.logs().limit = limit;
        self
    }

    pub fn basket_store<'a>(&self, jar: &'a mut CookieJar) -> BasketStore<&'a mut CookieJar> {
        BasketStore::new(Arc::clone(&self.catalog), jar)
            .with_currency(self.config.currency.clone())
            .with_expiry(self.config.cookie_expiry())
    }

    /// Run `f` against a tracker pushing into `layer`, then fold the events it
    /// sent into the visitor's log.
    pub fn track<R>(&self, visitor_id: &str, layer: &mut DataLayer, f: impl FnOnce(&mut EventTracker<&mut DataLayer>) -> R) -> R {
        let mut tracker = EventTracker::new(EventFormatter::new(self.config.currency.clone()), layer);
        let out = f(&mut tracker);
        let sent = tracker.into_log();
        self.logs().record(visitor_id, sent, Utc::now());
        out
    }

    pub fn events_for(&self, visitor_id: &str) -> Vec<String> {
        self.logs().visitors.get(visitor_id).map(|v| v.log.entries().to_vec()).unwrap_or_default()
    }

    /// Number of visitors with an event log in memory.
    pub fn tracked_visitors(&self) -> usize { self.logs().visitors.len() }

    fn logs(&self) -> MutexGuard<'_, VisitorLogs> { self.event_logs.lock().unwrap_or_else(PoisonError::into_inner) }
}

/// Per-request cookies and data layer.
pub(crate) struct Visit {
    pub(crate) jar: CookieJar,
    pub(crate) layer: DataLayer,
    pub(crate) visitor_id: String,
}

#[derive(Serialize)]
struct Tagged<T> { data: T, data_layer: Vec<Value> }

impl Visit {
    pub(crate) fn begin(state: &AppState, headers: &HeaderMap) -> Self {
        let mut jar = CookieJar::from_headers(headers);
        let visitor_id = match jar.get(VISITOR_COOKIE).filter(|id| Uuid::parse_str(id).is_ok()) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                jar.set(VISITOR_COOKIE, id.clone(), state.config.cookie_expiry());
                id
            }
        };
        Self { jar, layer: DataLayer::new(), visitor_id }
    }

    pub(crate) fn respond<T: Serialize>(self, data: T) -> Response {
        let headers = self.jar.into_headers();
        (headers, Json(Tagged { data, data_layer: self.layer.into_entries() })).into_response()
    }
}

pub(crate) fn reject(e: StorefrontError) -> (StatusCode, String) {
    let status = match e {
        StorefrontError::ProductNotFound(_) | StorefrontError::VariantNotFound { .. } => StatusCode::NOT_FOUND,
        StorefrontError::Checkout(_) => StatusCode::CONFLICT,
        StorefrontError::InvalidSku(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

pub(crate) fn invalid(e: ValidationErrors) -> (StatusCode, String) { (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()) }

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/session", get(handlers::session))
        .route("/api/v1/consent", axum::routing::put(handlers::update_consent))
        .route("/api/v1/products", get(handlers::list_products))
        .route("/api/v1/products/:id", get(handlers::get_product))
        .route("/api/v1/products/:id/select", post(handlers::select_product))
        .route("/api/v1/promotions/view", post(handlers::view_promotion))
        .route("/api/v1/promotions/select", post(handlers::select_promotion))
        .route("/api/v1/basket", get(handlers::get_basket).post(handlers::update_basket).delete(handlers::clear_basket))
        .route("/api/v1/checkout", post(handlers::begin_checkout))
        .route("/api/v1/checkout/shipping", post(handlers::add_shipping))
        .route("/api/v1/checkout/payment", post(handlers::add_payment))
        .route("/api/v1/checkout/complete", post(handlers::complete_checkout))
        .route("/api/v1/events", get(handlers::list_events))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}
