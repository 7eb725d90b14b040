//! # Domain Types
//!
//! Core domain types shared by the cart and the checkout.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    LineItem     │   │ ShippingMethod  │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  Standard       │   │  Card           │       │
//! │  │  size, color    │   │  Express        │   │  PayPal         │       │
//! │  │  unit_price     │   │  Free           │   │  BankTransfer   │       │
//! │  │  quantity       │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │    ItemKey      │   │    TaxRate      │                              │
//! │  │  ─────────────  │   │  ─────────────  │                              │
//! │  │  (product_id,   │   │  bps (u32)      │                              │
//! │  │   size, color)  │   │  2100 = 21% IVA │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Identity
//! Two entries with the same `(product_id, size, color)` are the same line.
//! The same shirt in M and in L are two lines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

/// Size stored when the product page sends none.
pub const DEFAULT_SIZE: &str = "Única";

/// Color stored when the product page sends none.
pub const DEFAULT_COLOR: &str = "Estándar";

fn default_size() -> String {
    DEFAULT_SIZE.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 2100 bps = 21% (Spanish IVA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Basis points in 100%.
    pub const BPS_SCALE: u32 = 10_000;

    /// Spanish general IVA rate.
    pub const IVA: TaxRate = TaxRate(2100);

    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::IVA
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One cart entry: a product in a given size and color.
///
/// Field names on the wire are the storefront's persisted names
/// (`id`, `price`, ...), so carts saved by older pages still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    /// Catalog product identifier.
    #[serde(rename = "id")]
    pub product_id: String,

    /// Name at the time it was added (not refreshed on merge).
    pub name: String,

    /// Unit price at the time it was added.
    #[serde(rename = "price")]
    pub unit_price: Money,

    /// Thumbnail URL.
    pub image: String,

    #[serde(default = "default_size")]
    pub size: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Always >= 1 inside a cart.
    pub quantity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl LineItem {
    /// unit_price × quantity, unrounded.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// The identity key of this line.
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
            color: self.color.clone(),
        }
    }

    /// Checks identity without allocating a key.
    pub fn matches(&self, key: &ItemKey) -> bool {
        self.product_id == key.product_id && self.size == key.size && self.color == key.color
    }
}

// =============================================================================
// Item Key
// =============================================================================

/// Identity of a cart line: `(product_id, size, color)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemKey {
    #[serde(rename = "id")]
    pub product_id: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_color")]
    pub color: String,
}

impl ItemKey {
    /// Builds a key, applying the default size/color for missing or blank values.
    pub fn new(product_id: impl Into<String>, size: Option<&str>, color: Option<&str>) -> Self {
        ItemKey {
            product_id: product_id.into(),
            size: non_blank(size).unwrap_or(DEFAULT_SIZE).to_string(),
            color: non_blank(color).unwrap_or(DEFAULT_COLOR).to_string(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.product_id, self.size, self.color)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// New Line Item (add-to-cart input)
// =============================================================================

/// What a product page sends when the shopper clicks "add to cart".
///
/// Every field is optional here; [`crate::cart::CartStore::add_item`] decides
/// what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLineItem {
    #[serde(rename = "id", default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "price", default)]
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Defaults to 1; non-positive values are treated as 1.
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewLineItem {
    /// Convenience constructor for the four required fields.
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        image: impl Into<String>,
    ) -> Self {
        NewLineItem {
            product_id: Some(product_id.into()),
            name: Some(name.into()),
            unit_price: Some(unit_price),
            image: Some(image.into()),
            ..Default::default()
        }
    }

    pub fn with_variant(mut self, size: impl Into<String>, color: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self.color = Some(color.into());
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// The identity key this input would occupy.
    pub fn key(&self) -> ItemKey {
        ItemKey::new(
            self.product_id.as_deref().unwrap_or_default().trim(),
            self.size.as_deref(),
            self.color.as_deref(),
        )
    }
}

// =============================================================================
// Shipping Method
// =============================================================================

/// Delivery option chosen on the shipping step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    /// 3-5 business days.
    Standard,
    /// 24-48 hours.
    Express,
    /// Pickup / promotional free delivery.
    Free,
}

impl ShippingMethod {
    pub const ALL: [ShippingMethod; 3] = [
        ShippingMethod::Standard,
        ShippingMethod::Express,
        ShippingMethod::Free,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
            ShippingMethod::Free => "free",
        }
    }

    /// Lenient parse of a radio-button value: anything unknown is standard.
    pub fn from_form_value(value: &str) -> Self {
        value.parse().unwrap_or(ShippingMethod::Standard)
    }
}

impl Default for ShippingMethod {
    fn default() -> Self {
        ShippingMethod::Standard
    }
}

impl fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShippingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ShippingMethod::Standard),
            "express" => Ok(ShippingMethod::Express),
            "free" => Ok(ShippingMethod::Free),
            _ => Err(ValidationError::NotAllowed {
                field: "Shipping method".to_string(),
                allowed: ShippingMethod::ALL.iter().map(|m| m.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// Payment option chosen on the payment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMethod {
    #[serde(rename = "card", alias = "credit_card")]
    Card,
    #[serde(rename = "paypal")]
    PayPal,
    #[serde(rename = "transfer", alias = "bank_transfer")]
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Card,
        PaymentMethod::PayPal,
        PaymentMethod::BankTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::PayPal => "paypal",
            PaymentMethod::BankTransfer => "transfer",
        }
    }

    /// Card payments need the card fields on the payment step.
    #[inline]
    pub fn requires_card_details(&self) -> bool {
        matches!(self, PaymentMethod::Card)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" | "credit_card" => Ok(PaymentMethod::Card),
            "paypal" => Ok(PaymentMethod::PayPal),
            "transfer" | "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            _ => Err(ValidationError::NotAllowed {
                field: "Payment method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
