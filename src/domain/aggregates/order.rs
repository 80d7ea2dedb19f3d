//! Order Aggregate
//!
//! Checkout walks a basket through begin → shipping → payment → placed. The
//! placed order keeps a snapshot of the basket so the purchase can still be
//! tagged after the live basket has been cleared.

use rust_decimal::Decimal;
use uuid::Uuid;
use crate::domain::aggregates::cart::Basket;

#[derive(Clone, Debug)]
pub struct Checkout {
    basket: Basket,
    status: CheckoutStatus,
    shipping_tier: Option<String>,
    payment_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Order {
    transaction_id: String,
    basket: Basket,
    value: Decimal,
    shipping_tier: Option<String>,
    payment_type: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)] pub enum CheckoutStatus { #[default] Started, ShippingAdded, PaymentAdded }

impl Checkout {
    pub fn begin(basket: Basket) -> Result<Self, OrderError> {
        if basket.is_empty() { return Err(OrderError::NoItems); }
        Ok(Self { basket, status: CheckoutStatus::Started, shipping_tier: None, payment_type: None })
    }

    pub fn status(&self) -> CheckoutStatus { self.status }
    pub fn basket(&self) -> &Basket { &self.basket }

    pub fn add_shipping(&mut self, tier: impl Into<String>) -> Result<(), OrderError> {
        let tier = tier.into();
        if tier.trim().is_empty() { return Err(OrderError::MissingShippingTier); }
        self.shipping_tier = Some(tier);
        self.status = CheckoutStatus::ShippingAdded;
        Ok(())
    }

    pub fn add_payment(&mut self, payment_type: impl Into<String>) -> Result<(), OrderError> {
        let payment_type = payment_type.into();
        if payment_type.trim().is_empty() { return Err(OrderError::MissingPaymentType); }
        self.payment_type = Some(payment_type);
        self.status = CheckoutStatus::PaymentAdded;
        Ok(())
    }

    pub fn place(self) -> Order {
        let value = self.basket.total();
        Order {
            transaction_id: Uuid::new_v4().to_string(), basket: self.basket, value,
            shipping_tier: self.shipping_tier, payment_type: self.payment_type,
        }
    }
}

impl Order {
    pub fn transaction_id(&self) -> &str { &self.transaction_id }
    pub fn basket(&self) -> &Basket { &self.basket }
    pub fn value(&self) -> Decimal { self.value }
    pub fn shipping_tier(&self) -> Option<&str> { self.shipping_tier.as_deref() }
    pub fn payment_type(&self) -> Option<&str> { self.payment_type.as_deref() }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, MissingShippingTier, MissingPaymentType }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::MissingShippingTier => write!(f, "Missing shipping tier"),
            Self::MissingPaymentType => write!(f, "Missing payment type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::Catalog;

    #[test]
    fn test_checkout_workflow() {
        let catalog = Catalog::demo();
        let (product, variant) = catalog.variant("blazer", "blazer_red_m").unwrap();
        let mut basket = Basket::new();
        basket.apply_delta(product, variant, 2);

        let mut checkout = Checkout::begin(basket).unwrap();
        checkout.add_shipping("Ground").unwrap();
        assert_eq!(checkout.status(), CheckoutStatus::ShippingAdded);
        checkout.add_payment("Credit Card").unwrap();
        let order = checkout.place();
        assert_eq!(order.value(), Decimal::new(300, 0));
        assert_eq!(order.shipping_tier(), Some("Ground"));
        assert!(Uuid::parse_str(order.transaction_id()).is_ok());
    }

    #[test]
    fn test_empty_basket_cannot_checkout() {
        assert_eq!(Checkout::begin(Basket::new()).unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_blank_shipping_rejected() {
        let catalog = Catalog::demo();
        let (product, variant) = catalog.variant("tshirt", "tshirt_m").unwrap();
        let mut basket = Basket::new();
        basket.apply_delta(product, variant, 1);
        let mut checkout = Checkout::begin(basket).unwrap();
        assert_eq!(checkout.add_shipping("  "), Err(OrderError::MissingShippingTier));
    }
}
