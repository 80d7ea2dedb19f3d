//! Basket Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::domain::aggregates::product::{Catalog, Product, ProductVariant};
use crate::domain::value_objects::{Quantity, Sku};
use crate::Result;

/// Visitor basket keyed by variant SKU. Holds at most one line per SKU.
#[derive(Clone, Debug, Default)]
pub struct Basket {
    lines: BTreeMap<Sku, BasketLine>,
}

#[derive(Clone, Debug)]
pub struct BasketLine {
    pub product: Arc<Product>,
    pub variant: ProductVariant,
    pub quantity: Quantity,
}

impl BasketLine {
    pub fn line_total(&self) -> Decimal { self.variant.price * Decimal::from(self.quantity.value()) }
}

/// Compact form of a basket line as written to the basket cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLine {
    pub product_id: String,
    #[serde(alias = "productVariantSku")]
    pub variant_sku: String,
    pub quantity: i64,
}

impl Basket {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> impl Iterator<Item = &BasketLine> { self.lines.values() }
    pub fn line(&self, sku: &str) -> Option<&BasketLine> { self.lines.get(sku) }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn total(&self) -> Decimal { self.lines.values().map(BasketLine::line_total).sum() }

    /// Apply one signed quantity change. Returns the surviving line, or `None`
    /// when the change removed it (or never created it).
    pub fn apply_delta(&mut self, product: &Arc<Product>, variant: &ProductVariant, delta: i64) -> Option<&BasketLine> {
        let next = match self.lines.get(&variant.sku) {
            Some(line) => line.quantity.apply(delta),
            None => Quantity::from_delta(delta),
        };
        match next {
            Some(quantity) => {
                let line = self.lines.entry(variant.sku.clone()).or_insert_with(|| BasketLine {
                    product: Arc::clone(product), variant: variant.clone(), quantity,
                });
                line.quantity = quantity;
                Some(line)
            }
            None => { self.lines.remove(&variant.sku); None }
        }
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    pub fn to_persisted(&self) -> Vec<PersistedLine> {
        self.lines.values().map(|l| PersistedLine {
            product_id: l.product.id().to_string(),
            variant_sku: l.variant.sku.to_string(),
            quantity: i64::from(l.quantity.value()),
        }).collect()
    }

    /// Rebuild from persisted lines. Any reference the catalog cannot resolve
    /// fails the whole basket. Lines at zero or below are dropped.
    pub fn from_persisted(lines: &[PersistedLine], catalog: &Catalog) -> Result<Self> {
        let mut basket = Self::new();
        for line in lines {
            let (product, variant) = catalog.variant(&line.product_id, &line.variant_sku)?;
            if let Some(quantity) = Quantity::from_delta(line.quantity) {
                basket.lines.insert(variant.sku.clone(), BasketLine { product: Arc::clone(product), variant: variant.clone(), quantity });
            }
        }
        Ok(basket)
    }
}
