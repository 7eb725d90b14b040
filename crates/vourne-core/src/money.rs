//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    subtotal * 0.21 = 10.479000000000001  ❌ WRONG!                      │
//! │                                                                         │
//! │  OUR SOLUTION: Exact decimals, rounded once                             │
//! │    49.90 * 0.21 = 10.4790            (kept at full precision)           │
//! │    total        = 60.3690 + 4.95     (summed at full precision)         │
//! │    displayed    = €65.32             (round half up, 2 digits)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vourne_core::money::Money;
//!
//! // Create from cents
//! let price = Money::from_cents(1099); // €10.99
//!
//! // Arithmetic operations
//! let doubled = price * 2;                      // €21.98
//! let total = price + Money::from_cents(500);   // €15.99
//! assert_eq!(doubled.to_string(), "€21.98");
//! assert_eq!(total.cents(), 1599);
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

/// Fractional digits shown to the shopper.
const DISPLAY_SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in euros, backed by an exact decimal.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  LineItem.unit_price ──► × quantity ──► Totals.subtotal                 │
/// │                                              │                          │
/// │                         tax (bps) ◄──────────┤                          │
/// │                         shipping  ◄──────────┘ (threshold check)        │
/// │                                                                         │
/// │  Totals ──rounded()──► CheckoutView / OrderPayload / "€65.32"           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// Arithmetic never rounds. Call [`Money::rounded`] at the display edge.
/// Serialized as a decimal string (`"10.99"`), deserialized from a string or
/// a JSON number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use vourne_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(495).to_string(), "€4.95");
    /// ```
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, DISPLAY_SCALE))
    }

    /// Wraps an exact decimal amount.
    #[inline]
    pub const fn from_decimal(amount: Decimal) -> Self {
        Money(amount)
    }

    /// A zero amount.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// The exact (unrounded) amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount in cents, after display rounding.
    pub fn cents(&self) -> i64 {
        let mut rounded = self.rounded().0;
        rounded.rescale(DISPLAY_SCALE);
        rounded.mantissa() as i64
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Rounds half away from zero to two fractional digits.
    ///
    /// ```rust
    /// use vourne_core::money::Money;
    /// use rust_decimal::Decimal;
    /// use std::str::FromStr;
    ///
    /// let raw = Money::from_decimal(Decimal::from_str("10.4790").unwrap());
    /// assert_eq!(raw.rounded().cents(), 1048);
    ///
    /// let half = Money::from_decimal(Decimal::from_str("0.125").unwrap());
    /// assert_eq!(half.rounded().cents(), 13);
    /// ```
    pub fn rounded(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Multiplies by a line quantity.
    #[inline]
    pub fn multiply_quantity(&self, qty: u32) -> Money {
        Money(self.0 * Decimal::from(qty))
    }

    /// Applies a tax rate at full precision.
    ///
    /// ```text
    /// €49.90 × 2100 bps = 49.90 × 2100 / 10000 = €10.4790
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(self.0 * Decimal::from(rate.bps()) / Decimal::from(TaxRate::BPS_SCALE))
    }
}

// =============================================================================
// Display / Parsing
// =============================================================================

impl fmt::Display for Money {
    /// Formats as euros with two decimals: "€10.99", "-€5.50".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shown = self.rounded().0;
        shown.rescale(DISPLAY_SCALE);
        if shown.is_sign_negative() && !shown.is_zero() {
            write!(f, "-€{}", shown.abs())
        } else {
            write!(f, "€{}", shown.abs())
        }
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    /// Parses a plain decimal ("49.90"); a leading "€" is tolerated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('€').unwrap_or(trimmed).trim();
        Decimal::from_str(digits)
            .map(Money)
            .map_err(|e| ValidationError::invalid("Amount", e.to_string()))
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, qty: u32) -> Money {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
