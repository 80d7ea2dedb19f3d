//! Value Objects for the storefront

pub mod consent;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

pub use consent::{Consent, ConsentCategory, ConsentStatus, ConsentUpdate};

/// SKU (Stock Keeping Unit) of a single product variant
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl Borrow<str> for Sku {
    fn borrow(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Sku::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "SKU empty"), Self::TooLong => write!(f, "SKU too long") }
    }
}

/// Quantity of one basket line, always at least one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    /// `None` for zero, since a line is never kept at zero.
    pub fn new(value: u32) -> Option<Self> { (value > 0).then_some(Self(value)) }
    pub fn value(&self) -> u32 { self.0 }

    /// Start a line from a delta. `None` when the delta leaves nothing to hold.
    pub fn from_delta(delta: i64) -> Option<Self> { Self::clamp(delta) }

    /// Apply a signed change. `None` means the line should be removed.
    pub fn apply(&self, delta: i64) -> Option<Self> { Self::clamp(i64::from(self.0).saturating_add(delta)) }

    fn clamp(total: i64) -> Option<Self> {
        if total <= 0 { return None; }
        Some(Self(u32::try_from(total).unwrap_or(u32::MAX)))
    }
}

/// Currency used for every price and tagged value in the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency { code: String, symbol: String }

impl Currency {
    pub fn new(code: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self { code: code.into().trim().to_uppercase(), symbol: symbol.into() }
    }
    pub fn gbp() -> Self { Self::new("GBP", "£") }
    pub fn code(&self) -> &str { &self.code }
    pub fn symbol(&self) -> &str { &self.symbol }

    /// Format an amount the way en-GB renders currency, e.g. `£1,000.50`.
    pub fn format(&self, amount: Decimal) -> String {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
        let text = format!("{:.2}", rounded.abs());
        let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
        format!("{sign}{}{}.{fraction}", self.symbol, group_thousands(whole))
    }
}

impl Default for Currency { fn default() -> Self { Self::gbp() } }

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 { grouped.push(','); }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() {
        let sku = Sku::new(" tshirt_m ").unwrap();
        assert_eq!(sku.as_str(), "tshirt_m");
        assert_eq!(Sku::new("  "), Err(SkuError::Empty));
        assert_eq!(Sku::new("x".repeat(51)), Err(SkuError::TooLong));
    }
    #[test]
    fn test_quantity_deltas() {
        let q = Quantity::from_delta(2).unwrap();
        assert_eq!(q.apply(3).unwrap().value(), 5);
        assert!(q.apply(-2).is_none());
        assert!(q.apply(-7).is_none());
        assert!(Quantity::from_delta(-1).is_none());
        assert!(Quantity::new(0).is_none());
    }
    #[test]
    fn test_currency_format() {
        let gbp = Currency::gbp();
        assert_eq!(gbp.format(Decimal::new(60, 0)), "£60.00");
        assert_eq!(gbp.format(Decimal::new(100053, 2)), "£1,000.53");
        assert_eq!(gbp.format(Decimal::new(1234567, 0)), "£1,234,567.00");
        assert_eq!(gbp.format(Decimal::new(-150, 0)), "-£150.00");
        assert_eq!(gbp.format(Decimal::ZERO), "£0.00");
        assert_eq!(gbp.format(Decimal::new(125, 3)), "£0.13");
        assert_eq!(gbp.format(Decimal::new(-125, 3)), "-£0.13");
        assert_eq!(gbp.format(Decimal::new(-1, 3)), "£0.00");
    }
}
