//! # Total Calculator
//!
//! Pure functions that derive order totals from line items.
//!
//! ## Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal = Σ unit_price × quantity                                     │
//! │  tax      = subtotal × tax_rate            (shipping is not taxed)      │
//! │  shipping = 0                          if subtotal ≥ free_threshold     │
//! │           = table[method]              otherwise (None → standard)      │
//! │  total    = subtotal + tax + shipping                                   │
//! │                                                                         │
//! │  Full precision throughout; Totals::rounded() for display.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are recomputed from scratch on every cart change and every shipping
//! method change. Nothing here keeps state.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{LineItem, ShippingMethod, TaxRate};

// =============================================================================
// Shipping Table
// =============================================================================

/// Shipping cost per method plus the free-shipping threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingTable {
    pub standard: Money,
    pub express: Money,
    pub free: Money,
    /// Orders at or above this subtotal ship free. `None` disables it.
    pub free_threshold: Option<Money>,
}

impl Default for ShippingTable {
    fn default() -> Self {
        ShippingTable {
            standard: Money::from_cents(495),
            express: Money::from_cents(995),
            free: Money::zero(),
            free_threshold: Some(Money::from_cents(10000)),
        }
    }
}

impl ShippingTable {
    /// Listed price of a method, ignoring the threshold.
    pub fn rate(&self, method: ShippingMethod) -> Money {
        match method {
            ShippingMethod::Standard => self.standard,
            ShippingMethod::Express => self.express,
            ShippingMethod::Free => self.free,
        }
    }

    pub fn qualifies_for_free_shipping(&self, subtotal: Money) -> bool {
        self.free_threshold
            .map(|threshold| subtotal >= threshold)
            .unwrap_or(false)
    }

    /// What the shopper pays for shipping.
    pub fn cost(&self, subtotal: Money, method: Option<ShippingMethod>) -> Money {
        if self.qualifies_for_free_shipping(subtotal) {
            return Money::zero();
        }
        self.rate(method.unwrap_or_default())
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Tax rate and shipping table used for every total in a storefront.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub tax_rate: TaxRate,
    pub shipping: ShippingTable,
}

impl Pricing {
    pub fn new(tax_rate: TaxRate, shipping: ShippingTable) -> Self {
        Pricing { tax_rate, shipping }
    }

    pub fn totals(&self, items: &[LineItem], method: Option<ShippingMethod>) -> Totals {
        compute_totals(items, method, &self.shipping, self.tax_rate)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Derived order totals.
///
/// Invariant: `total == subtotal + tax + shipping`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

impl Totals {
    pub fn zero() -> Self {
        Totals::default()
    }

    /// Rounds each component to cents; `total` is the sum of the rounded
    /// components so the displayed figures always add up.
    pub fn rounded(&self) -> Totals {
        let subtotal = self.subtotal.rounded();
        let tax = self.tax.rounded();
        let shipping = self.shipping.rounded();
        Totals {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }
}

/// Computes subtotal, tax, shipping and total.
///
/// ```rust
/// use vourne_core::money::Money;
/// use vourne_core::totals::{compute_totals, ShippingTable};
/// use vourne_core::types::{LineItem, ShippingMethod, TaxRate};
///
/// let shirt = LineItem {
///     product_id: "1".into(),
///     name: "Camisa".into(),
///     unit_price: Money::from_cents(2000),
///     image: "c.jpg".into(),
///     size: "M".into(),
///     color: "Blanco".into(),
///     quantity: 2,
///     sku: None,
///     category: None,
/// };
///
/// let totals = compute_totals(
///     &[shirt],
///     Some(ShippingMethod::Express),
///     &ShippingTable::default(),
///     TaxRate::from_bps(2100),
/// );
/// assert_eq!(totals.subtotal, Money::from_cents(4000));
/// assert_eq!(totals.tax, Money::from_cents(840));
/// assert_eq!(totals.shipping, Money::from_cents(995));
/// assert_eq!(totals.total, Money::from_cents(5835));
/// ```
pub fn compute_totals(
    items: &[LineItem],
    method: Option<ShippingMethod>,
    table: &ShippingTable,
    tax_rate: TaxRate,
) -> Totals {
    let subtotal: Money = items.iter().map(LineItem::line_total).sum();
    let tax = subtotal.calculate_tax(tax_rate);
    let shipping = table.cost(subtotal, method);

    Totals {
        subtotal,
        tax,
        shipping,
        total: subtotal + tax + shipping,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
