//! # vourne-core: Cart and Checkout Engine for the Vourne Storefront
//!
//! Everything the storefront decides about a purchase lives here: what is in
//! the cart, what it costs, and whether the shopper may move on to the next
//! checkout step.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Vourne Storefront                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/storefront (config, HTTP, driver)             │   │
//! │  │   add_to_cart ──► checkout_advance ──► submit_order             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vourne-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │   │
//! │  │   │  money   │  │   cart   │  │  totals  │  │   checkout   │   │   │
//! │  │   │  Money   │  │CartStore │  │ Pricing  │  │CheckoutSession│  │   │
//! │  │   │ TaxRate  │  │ LineItem │  │ Shipping │  │ form, rules  │   │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   I/O only through the CartStorage and OrderSubmitter traits    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            vourne-storage (file-backed CartStorage)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Decimal money, rounded to cents for display
//! - [`types`] - Line items, item keys, shipping and payment methods
//! - [`totals`] - Subtotal, IVA, shipping and total
//! - [`cart`] - The persisted cart with change notifications
//! - [`storage`] - The key-value persistence seam
//! - [`form`] - Checkout fields, drafts and the error map
//! - [`validation`] - Field rules and cart input checks
//! - [`checkout`] - The three-step checkout state machine
//! - [`order`] - Committed data and the order payload
//! - [`submission`] - Order backend and email availability seams
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use vourne_core::{CartStore, Money, NewLineItem, Pricing};
//!
//! let mut cart = CartStore::in_memory(Pricing::default());
//! cart.add_item(NewLineItem::new("1", "Camisa Lino", Money::from_cents(4990), "/img/1.jpg"))
//!     .unwrap();
//! cart.add_item(NewLineItem::new("1", "Camisa Lino", Money::from_cents(4990), "/img/1.jpg"))
//!     .unwrap();
//!
//! assert_eq!(cart.line_count(), 1);
//! assert_eq!(cart.item_count(), 2);
//!
//! // 99.80 is below the free-shipping threshold: standard shipping applies
//! let totals = cart.totals(None).rounded();
//! assert_eq!(totals.shipping, Money::from_cents(495));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod error;
pub mod form;
pub mod money;
pub mod order;
pub mod storage;
pub mod submission;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartChange, CartStore, CartSummary, SubscriptionId};
pub use checkout::{Advance, CheckoutSession, CheckoutStatus, CheckoutStep, CheckoutView};
pub use error::{
    CheckoutError, CheckoutResult, CoreError, CoreResult, PersistenceError, SubmissionError,
    ValidationError,
};
pub use form::{CheckoutForm, Field, ValidationErrors};
pub use money::Money;
pub use order::{Address, CustomerInfo, OrderConfirmation, OrderPayload, PaymentInfo, ShippingInfo};
pub use storage::{CartStorage, MemoryStorage, CART_STORAGE_KEY};
pub use submission::{EmailAvailability, OrderSubmitter};
pub use totals::{compute_totals, Pricing, ShippingTable, Totals};
pub use types::*;
pub use validation::{CheckoutRules, CheckoutSettings};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in one cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typos like 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: u32 = 999;
