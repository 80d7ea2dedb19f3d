//! Product Catalog
//!
//! The catalog is compiled-in demo data standing in for a real backend. It is
//! validated once at construction so lookups of a product's default variant
//! never dangle afterwards.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use crate::domain::value_objects::{Currency, Sku};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    id: String,
    name: String,
    description: String,
    brand: Option<String>,
    categories: Vec<String>,
    default_variant: Sku,
    variants: BTreeMap<Sku, ProductVariant>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductVariant {
    pub sku: Sku,
    /// Internal variant label, e.g. `tshirt#M`.
    pub name: String,
    pub display_name: String,
    pub size: String,
    pub image: String,
    pub color: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl ProductVariant {
    pub fn new(sku: &str, name: &str, display_name: &str, size: &str, image: &str, price: Decimal) -> Result<Self> {
        Ok(Self {
            sku: Sku::new(sku)?, name: name.into(), display_name: display_name.into(),
            size: size.into(), image: image.into(), color: None, price,
        })
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self { self.color = Some(color.into()); self }
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        default_variant: &str,
        variants: Vec<ProductVariant>,
    ) -> Result<Self> {
        let id = id.into();
        let mut by_sku = BTreeMap::new();
        for variant in variants {
            if variant.price.is_sign_negative() && !variant.price.is_zero() {
                return Err(StorefrontError::NegativePrice(variant.sku.to_string()));
            }
            if by_sku.contains_key(&variant.sku) {
                return Err(StorefrontError::DuplicateSku(variant.sku.to_string()));
            }
            by_sku.insert(variant.sku.clone(), variant);
        }
        let default_variant = Sku::new(default_variant)?;
        if !by_sku.contains_key(&default_variant) {
            return Err(StorefrontError::DanglingDefaultVariant { product_id: id, sku: default_variant.to_string() });
        }
        Ok(Self {
            id, name: name.into(), description: description.into(), brand: None,
            categories: vec![], default_variant, variants: by_sku,
        })
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self { self.brand = Some(brand.into()); self }

    /// Category path, most general first. Only the first five are tagged.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where I: IntoIterator<Item = S>, S: Into<String> {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn brand(&self) -> Option<&str> { self.brand.as_deref() }
    pub fn categories(&self) -> &[String] { &self.categories }
    pub fn variants(&self) -> impl Iterator<Item = &ProductVariant> { self.variants.values() }
    pub fn variant(&self, sku: &str) -> Option<&ProductVariant> { self.variants.get(sku) }

    pub fn default_variant(&self) -> &ProductVariant {
        self.variants.get(&self.default_variant).expect("default variant is checked in Product::new")
    }

    pub fn default_price_formatted(&self, currency: &Currency) -> String { currency.format(self.default_variant().price) }
}

/// Read-only product table
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Arc<Product>>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut skus = HashSet::new();
        for product in &products {
            if !ids.insert(product.id.clone()) {
                return Err(StorefrontError::DuplicateProduct(product.id.clone()));
            }
            for sku in product.variants.keys() {
                if !skus.insert(sku.clone()) { return Err(StorefrontError::DuplicateSku(sku.to_string())); }
            }
        }
        Ok(Self { products: products.into_iter().map(Arc::new).collect() })
    }

    pub fn products(&self) -> impl Iterator<Item = &Arc<Product>> { self.products.iter() }
    pub fn len(&self) -> usize { self.products.len() }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }

    pub fn find(&self, id: &str) -> Option<&Arc<Product>> { self.products.iter().find(|p| p.id == id) }

    pub fn product(&self, id: &str) -> Result<&Arc<Product>> {
        self.find(id).ok_or_else(|| StorefrontError::ProductNotFound(id.to_string()))
    }

    pub fn variant(&self, product_id: &str, sku: &str) -> Result<(&Arc<Product>, &ProductVariant)> {
        let product = self.product(product_id)?;
        let variant = product.variant(sku).ok_or_else(|| StorefrontError::VariantNotFound {
            product_id: product_id.to_string(), sku: sku.to_string(),
        })?;
        Ok((product, variant))
    }

    /// The demo store's three products.
    pub fn demo() -> Self {
        Self::build_demo().expect("demo catalog is well-formed")
    }

    fn build_demo() -> Result<Self> {
        let blazer = Product::new(
            "blazer", "Blazer",
            "This elegant blazer adds a bold pop of color to any outfit. Classic button-up design offers timeless style.",
            "blazer_red_m",
            vec![
                ProductVariant::new("blazer_red_m", "blazer#red#m", "Red", "M", "blazer-red.png", Decimal::new(150, 0))?.with_color("Red"),
                ProductVariant::new("blazer_green_m", "blazer#green#m", "Green", "M", "blazer-green.png", Decimal::new(180, 0))?.with_color("Green"),
                ProductVariant::new("blazer_brown_m", "blazer#brown#m", "Brown", "M", "blazer-brown.png", Decimal::new(155, 0))?.with_color("Brown"),
            ],
        )?.with_brand("Demo Store").with_categories(["Apparel", "Jackets"]);

        let tshirt = Product::new(
            "tshirt", "T-Shirt",
            "Brighten your wardrobe with this sunny yellow short-sleeved t-shirt. Soft, breathable fabric for all-day comfort.",
            "tshirt_m",
            ["L", "M", "S"].iter().zip(["Large", "Medium", "Small"])
                .map(|(size, label)| ProductVariant::new(
                    &format!("tshirt_{}", size.to_lowercase()), &format!("tshirt#{size}"), label, size, "t-shirt.jpg", Decimal::new(30, 0),
                ).map(|v| v.with_color("Yellow")))
                .collect::<Result<Vec<_>>>()?,
        )?.with_brand("Demo Store").with_categories(["Apparel", "Tops"]);

        let shoes = Product::new(
            "shoes", "Shoes",
            "These cheerful yellow lace-up shoes offer unbeatable comfort and style. Perfect for casual outings or a pop of color at work.",
            "shoes_6",
            (4..=8)
                .map(|size| ProductVariant::new(
                    &format!("shoes_{size}"), &format!("shoes#{size}"), &format!("Size: {size}"), &size.to_string(), "shoes.jpg", Decimal::new(80, 0),
                ).map(|v| v.with_color("Yellow")))
                .collect::<Result<Vec<_>>>()?,
        )?.with_brand("Demo Store").with_categories(["Footwear"]);

        Self::new(vec![blazer, tshirt, shoes])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalog() {
        let catalog = Catalog::demo();
        assert_eq!(catalog.len(), 3);
        let ids: Vec<_> = catalog.products().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, ["blazer", "tshirt", "shoes"]);
        let tshirt = catalog.product("tshirt").unwrap();
        assert_eq!(tshirt.default_variant().sku.as_str(), "tshirt_m");
        assert_eq!(tshirt.default_variant().name, "tshirt#M");
        assert_eq!(catalog.product("shoes").unwrap().variants().count(), 5);
        assert_eq!(catalog.product("shoes").unwrap().default_variant().display_name, "Size: 6");
    }

    #[test]
    fn test_variant_lookup() {
        let catalog = Catalog::demo();
        let (product, variant) = catalog.variant("blazer", "blazer_green_m").unwrap();
        assert_eq!(product.name(), "Blazer");
        assert_eq!(variant.price, Decimal::new(180, 0));
        assert!(matches!(catalog.variant("blazer", "tshirt_m"), Err(StorefrontError::VariantNotFound { .. })));
        assert!(matches!(catalog.product("hat"), Err(StorefrontError::ProductNotFound(_))));
    }

    #[test]
    fn test_dangling_default_rejected() {
        let v = ProductVariant::new("a_1", "a#1", "One", "1", "a.png", Decimal::ONE).unwrap();
        let err = Product::new("a", "A", "", "a_2", vec![v]).unwrap_err();
        assert!(matches!(err, StorefrontError::DanglingDefaultVariant { .. }));
    }

    #[test]
    fn test_duplicate_sku_across_products_rejected() {
        let make = |id: &str| Product::new(id, id, "", "same", vec![
            ProductVariant::new("same", "s", "S", "M", "s.png", Decimal::ONE).unwrap(),
        ]).unwrap();
        assert!(matches!(Catalog::new(vec![make("a"), make("b")]), Err(StorefrontError::DuplicateSku(_))));
    }

    #[test]
    fn test_price_formatting() {
        let catalog = Catalog::demo();
        assert_eq!(catalog.product("blazer").unwrap().default_price_formatted(&Currency::gbp()), "£150.00");
    }
}
