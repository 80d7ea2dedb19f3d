//! Runtime configuration, read from the environment (and `.env` via dotenvy).

use anyhow::{bail, Context, Result};
use std::ops::RangeInclusive;
use chrono::Duration;
use std::env;
use crate::domain::value_objects::Currency;
use crate::storage::DEFAULT_EXPIRY_DAYS;

/// Cookie lifetimes accepted from the environment, in days.
pub const COOKIE_EXPIRY_RANGE: RangeInclusive<i64> = 1..=3650;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub currency: Currency,
    /// Web container the browser loads; echoed in the session bootstrap.
    pub gtm_container_id: Option<String>,
    pub cookie_expiry_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self { port: 8080, currency: Currency::gbp(), gtm_container_id: None, cookie_expiry_days: DEFAULT_EXPIRY_DAYS }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let port = match lookup("PORT") {
            Some(p) => p.parse().with_context(|| format!("PORT must be a port number, got {p:?}"))?,
            None => defaults.port,
        };
        let cookie_expiry_days = match lookup("COOKIE_EXPIRY_DAYS") {
            Some(d) => d.parse().with_context(|| format!("COOKIE_EXPIRY_DAYS must be a whole number of days, got {d:?}"))?,
            None => defaults.cookie_expiry_days,
        };
        if !COOKIE_EXPIRY_RANGE.contains(&cookie_expiry_days) {
            bail!(
                "COOKIE_EXPIRY_DAYS must be between {} and {}, got {cookie_expiry_days}",
                COOKIE_EXPIRY_RANGE.start(), COOKIE_EXPIRY_RANGE.end(),
            );
        }
        let currency = Currency::new(
            lookup("CURRENCY_CODE").unwrap_or_else(|| defaults.currency.code().to_string()),
            lookup("CURRENCY_SYMBOL").unwrap_or_else(|| defaults.currency.symbol().to_string()),
        );
        let gtm_container_id = lookup("GTM_WEB_CONTAINER_ID").filter(|id| !id.trim().is_empty());
        Ok(Self { port, currency, gtm_container_id, cookie_expiry_days })
    }

    pub fn cookie_expiry(&self) -> Duration {
        Duration::days(self.cookie_expiry_days.clamp(*COOKIE_EXPIRY_RANGE.start(), *COOKIE_EXPIRY_RANGE.end()))
    }
}
