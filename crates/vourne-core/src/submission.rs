//! # Checkout Collaborators
//!
//! The two asynchronous seams of the checkout: the order backend and the
//! remote email-availability check. Concrete clients live in the app crate;
//! tests use scripted fakes.

use async_trait::async_trait;

use crate::error::SubmissionError;
use crate::order::{OrderConfirmation, OrderPayload};

/// Sends a finalized order to the store backend.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Consumes the payload; the caller rebuilds it for a retry.
    async fn submit(&self, order: OrderPayload) -> Result<OrderConfirmation, SubmissionError>;
}

/// Asks the backend whether an email may be used for a new order.
#[async_trait]
pub trait EmailAvailability: Send + Sync {
    async fn is_email_available(&self, email: &str) -> Result<bool, SubmissionError>;
}

#[async_trait]
impl<T: OrderSubmitter + ?Sized> OrderSubmitter for std::sync::Arc<T> {
    async fn submit(&self, order: OrderPayload) -> Result<OrderConfirmation, SubmissionError> {
        (**self).submit(order).await
    }
}

#[async_trait]
impl<T: EmailAvailability + ?Sized> EmailAvailability for std::sync::Arc<T> {
    async fn is_email_available(&self, email: &str) -> Result<bool, SubmissionError> {
        (**self).is_email_available(email).await
    }
}
