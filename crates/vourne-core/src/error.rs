//! # Error Types
//!
//! Domain-specific error types for vourne-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vourne-core errors (this file)                                        │
//! │  ├── ValidationError   - Bad input shape/range (field-scoped)          │
//! │  ├── CoreError         - Cart rule violations                          │
//! │  ├── PersistenceError  - Storage read/write failures (recovered)       │
//! │  ├── SubmissionError   - Order collaborator failures                   │
//! │  └── CheckoutError     - Checkout navigation / submission failures     │
//! │                                                                         │
//! │  apps/storefront                                                       │
//! │  └── ApiError          - What the frontend sees (serialized)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError/CheckoutError → ApiError → Frontend │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recovery Rules
//! - `ValidationError`: shown next to the field, never fatal
//! - `PersistenceError`: logged, the cart keeps working in memory
//! - `SubmissionError`: shown on the payment step, checkout state untouched

use thiserror::Error;

use crate::checkout::CheckoutStep;
use crate::form::{Field, ValidationErrors};

// =============================================================================
// Core Error
// =============================================================================

/// Cart business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Cart has exceeded maximum allowed distinct lines.
    #[error("Cart cannot have more than {max} different items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    ///
    /// ## When This Occurs
    /// ```text
    /// Line "Camisa / M / Negro" has qty 998
    ///      │
    ///      ▼
    /// add_item(qty: 5)  → 1003 > 999
    ///      │
    ///      ▼
    /// QuantityTooLarge { requested: 1003, max: 999 }  (cart unchanged)
    /// ```
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// The `field` strings are human labels ("Email", "Postal code"), so the
/// rendered message can be shown next to the input as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email, card number failing checksum).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., email already registered).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A checkbox that must be ticked (terms and conditions).
    #[error("{field} must be accepted")]
    MustAccept { field: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Persistence Error
// =============================================================================

/// Durable storage failures.
///
/// Never surfaced to the shopper as a blocking error: the cart store logs it
/// and falls back to an empty (on load) or in-memory (on save) cart.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backing store cannot be reached at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing a key failed.
    #[error("Storage I/O failed for key '{key}': {reason}")]
    Io { key: String, reason: String },

    /// Stored data exists but is not a cart.
    #[error("Stored cart is corrupt: {0}")]
    Corrupt(String),

    /// The cart could not be serialized.
    #[error("Could not serialize cart: {0}")]
    Serialization(String),
}

// =============================================================================
// Submission Error
// =============================================================================

/// Failures reported by the order submission collaborator
/// (or by a remote validation check).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The backend validated the order and refused it.
    #[error("Order rejected: {reason}")]
    Rejected { reason: String },

    /// The payment was not accepted.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// Network failure, timeout or server error. Safe to retry.
    #[error("Temporary failure, please retry: {0}")]
    Transient(String),
}

impl SubmissionError {
    /// Returns true if retrying the same order may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionError::Transient(_))
    }
}

// =============================================================================
// Checkout Error
// =============================================================================

/// Checkout state machine errors.
///
/// None of these leave the checkout half-updated: a refused call changes at
/// most the validation error map.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout cannot start (or finish) with nothing in the cart.
    #[error("Your cart is empty")]
    EmptyCart,

    /// The current step's validator failed; the step did not change.
    #[error("Cannot leave the {step} step: {errors}")]
    StepRejected {
        step: CheckoutStep,
        errors: ValidationErrors,
    },

    /// `retreat()` on the first step.
    #[error("Already at the first checkout step")]
    AtFirstStep,

    /// `submit()` before reaching the payment step.
    #[error("Order can only be submitted from the payment step (currently at {step})")]
    NotAtFinalStep { step: CheckoutStep },

    /// Billing fields are hidden while they mirror the shipping address.
    #[error("{0} is hidden while billing matches shipping")]
    FieldHidden(Field),

    /// Selections (methods, terms) have dedicated setters.
    #[error("{0} is not a text field")]
    NotATextField(Field),

    /// The session already produced an order.
    #[error("Order already submitted")]
    AlreadySubmitted,

    /// The in-flight submission was cancelled; nothing was committed.
    #[error("Submission cancelled")]
    Cancelled,

    /// The order collaborator refused or failed.
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Invalid checkout configuration (e.g., a postal code pattern).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::QuantityTooLarge {
            requested: 1003,
            max: 999,
        };
        assert_eq!(
            err.to_string(),
            "Quantity 1003 exceeds maximum allowed (999)"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("Email").to_string(),
            "Email is required"
        );
        assert_eq!(
            ValidationError::invalid("Card number", "failed checksum").to_string(),
            "Card number has invalid format: failed checksum"
        );
        let err = ValidationError::MustAccept {
            field: "Terms and conditions".to_string(),
        };
        assert_eq!(err.to_string(), "Terms and conditions must be accepted");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("Name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_only_transient_submission_errors_are_retryable() {
        assert!(SubmissionError::Transient("timeout".into()).is_retryable());
        assert!(!SubmissionError::PaymentDeclined("insufficient funds".into()).is_retryable());
        assert!(!SubmissionError::Rejected {
            reason: "bad email".into()
        }
        .is_retryable());
    }
}
