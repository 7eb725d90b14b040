//! # API Error Type
//!
//! Unified error type for storefront commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Storefront                         │
//! │                                                                         │
//! │  {"command":"next_step"}                                                │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function  ──►  AppResult<T>                             │  │
//! │  │         │                                                        │  │
//! │  │  CoreError        ─┐                                             │  │
//! │  │  CheckoutError    ─┤                                             │  │
//! │  │  SubmissionError  ─┼──► ApiError { code, message, fields? } ────►│  │
//! │  │  StorageError     ─┤                                             │  │
//! │  │  ConfigError      ─┘                                             │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  {"ok":false,"error":{"code":"STEP_REJECTED","message":"...",           │
//! │                       "fields":{"email":"Email is required"}}}          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use vourne_core::{CheckoutError, CoreError, SubmissionError, ValidationError, ValidationErrors};
use vourne_storage::StorageError;

use crate::config::ConfigError;

/// Error returned from storefront commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "PAYMENT_DECLINED",
///   "message": "Payment declined: Tarjeta rechazada"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Per-field messages when a checkout step was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
}

/// Error codes for command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed
    ValidationError,

    /// Cart limits exceeded
    CartError,

    /// Checkout needs a non-empty cart
    EmptyCart,

    /// The current step has invalid fields
    StepRejected,

    /// Next/previous/submit used at the wrong step
    NavigationError,

    /// No checkout in progress
    NoCheckout,

    /// The checkout already produced an order
    AlreadySubmitted,

    /// The backend refused the order
    OrderRejected,

    /// The payment was declined
    PaymentError,

    /// Backend unreachable or timed out; retry is safe
    ServiceUnavailable,

    /// Submission abandoned before an answer
    Cancelled,

    /// Cart storage failed
    StorageError,

    /// Configuration is invalid
    ConfigError,

    /// Unparseable command
    InvalidCommand,

    /// Internal error
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            fields: None,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn no_checkout() -> Self {
        ApiError::new(ErrorCode::NoCheckout, "No checkout in progress")
    }

    pub fn invalid_command(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::InvalidCommand, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn with_fields(mut self, fields: ValidationErrors) -> Self {
        self.fields = Some(fields);
        self
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CartTooLarge { .. } => ApiError::new(ErrorCode::CartError, err.to_string()),
            CoreError::QuantityTooLarge { .. } => {
                ApiError::new(ErrorCode::ValidationError, err.to_string())
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

/// Converts submission errors to API errors.
impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        let code = match err {
            SubmissionError::Rejected { .. } => ErrorCode::OrderRejected,
            SubmissionError::PaymentDeclined(_) => ErrorCode::PaymentError,
            SubmissionError::Transient(_) => ErrorCode::ServiceUnavailable,
        };
        ApiError::new(code, err.to_string())
    }
}

/// Converts checkout errors to API errors.
impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => ApiError::new(ErrorCode::EmptyCart, err.to_string()),
            CheckoutError::StepRejected { ref errors, .. } => {
                let fields = errors.clone();
                ApiError::new(ErrorCode::StepRejected, err.to_string()).with_fields(fields)
            }
            CheckoutError::AtFirstStep | CheckoutError::NotAtFinalStep { .. } => {
                ApiError::new(ErrorCode::NavigationError, err.to_string())
            }
            CheckoutError::FieldHidden(_) | CheckoutError::NotATextField(_) => {
                ApiError::validation(err.to_string())
            }
            CheckoutError::AlreadySubmitted => {
                ApiError::new(ErrorCode::AlreadySubmitted, err.to_string())
            }
            CheckoutError::Cancelled => ApiError::new(ErrorCode::Cancelled, err.to_string()),
            CheckoutError::Submission(e) => e.into(),
            CheckoutError::Validation(e) => e.into(),
        }
    }
}

/// Converts storage errors to API errors.
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!("Storage error: {}", err);
        ApiError::new(ErrorCode::StorageError, "Cart storage is unavailable")
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for storefront commands.
pub type AppResult<T> = Result<T, ApiError>;
