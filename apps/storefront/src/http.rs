//! # HTTP Order Backend
//!
//! reqwest clients for the store's PHP endpoints.
//!
//! ## Wire Format
//! ```text
//! POST process-order.php
//! {
//!   "reference": "8f0c…",
//!   "customer": { "email", "firstName", "lastName", "phone",
//!                 "address", "city", "postalCode", "country" },
//!   "billing":  { "address", "city", "postalCode", "country" },
//!   "items":    [ { "id", "name", "price", "quantity", "size", "color", … } ],
//!   "shipping": "standard" | "express" | "free",
//!   "payment":  "card" | "paypal" | "transfer",
//!   "totals":   { "subtotal", "tax", "shipping", "total" }
//! }
//!
//! 200 {"success": true,  "order_number": "VOURNE-20260314-4821", "message": …}
//! 400 {"success": false, "error": "Email no válido"}
//! 400 {"success": false, "error": "Error en el procesamiento del pago: …"}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use vourne_core::{
    EmailAvailability, LineItem, OrderConfirmation, OrderPayload, OrderSubmitter, PaymentMethod,
    ShippingMethod, SubmissionError, Totals,
};

use crate::config::ApiSettings;

/// Prefix the backend puts on payment failures.
const PAYMENT_FAILURE_PREFIX: &str = "Error en el procesamiento del pago";

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerBody<'a> {
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    phone: &'a str,
    address: &'a str,
    city: &'a str,
    postal_code: &'a str,
    country: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BillingBody<'a> {
    address: &'a str,
    city: &'a str,
    postal_code: &'a str,
    country: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest<'a> {
    reference: String,
    customer: CustomerBody<'a>,
    billing: BillingBody<'a>,
    items: &'a [LineItem],
    shipping: ShippingMethod,
    payment: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    card_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    card_last_four: Option<&'a str>,
    terms_accepted: bool,
    totals: &'a Totals,
}

impl<'a> OrderRequest<'a> {
    fn from_payload(order: &'a OrderPayload) -> Self {
        let customer = order.customer();
        let shipping = order.shipping();
        let billing = order.billing();
        let payment = order.payment();
        OrderRequest {
            reference: order.reference().to_string(),
            customer: CustomerBody {
                email: &customer.email,
                first_name: &customer.first_name,
                last_name: &customer.last_name,
                phone: &customer.phone,
                address: &shipping.address.address,
                city: &shipping.address.city,
                postal_code: &shipping.address.postal_code,
                country: &shipping.address.country,
            },
            billing: BillingBody {
                address: &billing.address,
                city: &billing.city,
                postal_code: &billing.postal_code,
                country: &billing.country,
            },
            items: order.items(),
            shipping: shipping.method,
            payment: payment.method,
            card_name: payment.card_name.as_deref(),
            card_last_four: payment.card_last_four.as_deref(),
            terms_accepted: order.terms_accepted(),
            totals: order.totals(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order_number: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailResponse {
    available: bool,
}

/// Maps an HTTP status and body onto the submission outcome.
///
/// ## Mapping
/// ```text
/// 2xx + success + order_number     → Ok(OrderConfirmation)
/// 5xx / 408 / 429                  → Transient
/// error starts with payment prefix → PaymentDeclined
/// anything else                    → Rejected
/// ```
pub fn interpret_order_response(
    status: u16,
    body: &str,
) -> Result<OrderConfirmation, SubmissionError> {
    if status >= 500 || status == 408 || status == 429 {
        return Err(SubmissionError::Transient(format!(
            "order backend answered HTTP {}",
            status
        )));
    }

    let parsed: OrderResponse = serde_json::from_str(body).map_err(|e| {
        SubmissionError::Transient(format!("unreadable order backend response: {}", e))
    })?;

    if (200..300).contains(&status) && parsed.success {
        return match parsed.order_number {
            Some(order_number) if !order_number.trim().is_empty() => Ok(OrderConfirmation {
                order_number,
                message: parsed.message,
            }),
            _ => Err(SubmissionError::Transient(
                "order backend accepted the order without a number".into(),
            )),
        };
    }

    let reason = parsed
        .error
        .or(parsed.message)
        .unwrap_or_else(|| format!("HTTP {}", status));

    if let Some(detail) = reason.strip_prefix(PAYMENT_FAILURE_PREFIX) {
        let detail = detail.trim_start_matches(':').trim();
        return Err(SubmissionError::PaymentDeclined(if detail.is_empty() {
            reason.clone()
        } else {
            detail.to_string()
        }));
    }

    Err(SubmissionError::Rejected { reason })
}

fn transport_error(err: reqwest::Error) -> SubmissionError {
    if err.is_timeout() {
        SubmissionError::Transient("order backend timed out".into())
    } else {
        SubmissionError::Transient(err.to_string())
    }
}

fn build_client(settings: &ApiSettings) -> Result<reqwest::Client, SubmissionError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|e| SubmissionError::Transient(format!("cannot build HTTP client: {}", e)))
}

// =============================================================================
// Order Submitter
// =============================================================================

/// Posts finalized orders to the `process-order` endpoint.
#[derive(Debug, Clone)]
pub struct HttpOrderSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOrderSubmitter {
    pub fn new(settings: &ApiSettings) -> Result<Self, SubmissionError> {
        Ok(HttpOrderSubmitter {
            client: build_client(settings)?,
            endpoint: settings.order_endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OrderSubmitter for HttpOrderSubmitter {
    async fn submit(&self, order: OrderPayload) -> Result<OrderConfirmation, SubmissionError> {
        let request = OrderRequest::from_payload(&order);
        debug!(
            reference = %request.reference,
            endpoint = %self.endpoint,
            lines = order.items().len(),
            "Posting order"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        let outcome = interpret_order_response(status, &body);
        if let Err(ref e) = outcome {
            warn!(status, error = %e, "Order backend refused the order");
        }
        outcome
    }
}

// =============================================================================
// Email Availability
// =============================================================================

/// Asks the backend whether an email is still free.
#[derive(Debug, Clone)]
pub struct HttpEmailAvailability {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEmailAvailability {
    pub fn new(
        settings: &ApiSettings,
        endpoint: impl Into<String>,
    ) -> Result<Self, SubmissionError> {
        Ok(HttpEmailAvailability {
            client: build_client(settings)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl EmailAvailability for HttpEmailAvailability {
    async fn is_email_available(&self, email: &str) -> Result<bool, SubmissionError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("email", email)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Transient(format!(
                "email check answered HTTP {}",
                status.as_u16()
            )));
        }

        let body: EmailResponse = response.json().await.map_err(|e| {
            SubmissionError::Transient(format!("unreadable email check response: {}", e))
        })?;
        Ok(body.available)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let body = r#"{"success":true,"order_number":"VOURNE-20260314-4821","message":"Pedido procesado correctamente","payment":{"success":true}}"#;
        let confirmation = interpret_order_response(200, body).unwrap();
        assert_eq!(confirmation.order_number, "VOURNE-20260314-4821");
        assert_eq!(confirmation.message.as_deref(), Some("Pedido procesado correctamente"));
    }

    #[test]
    fn test_validation_failure_is_rejected() {
        let body = r#"{"success":false,"error":"Email no válido"}"#;
        assert_eq!(
            interpret_order_response(400, body),
            Err(SubmissionError::Rejected {
                reason: "Email no válido".into()
            })
        );
    }

    #[test]
    fn test_payment_failure_is_declined() {
        let body = r#"{"success":false,"error":"Error en el procesamiento del pago: Método de pago no válido"}"#;
        assert_eq!(
            interpret_order_response(400, body),
            Err(SubmissionError::PaymentDeclined("Método de pago no válido".into()))
        );
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = interpret_order_response(503, "<html>down</html>").unwrap_err();
        assert!(err.is_retryable());
        let err = interpret_order_response(200, "not json").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_success_without_number_is_transient() {
        let err = interpret_order_response(200, r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, SubmissionError::Transient(_)));
    }

    #[test]
    fn test_new_submitter_keeps_endpoint() {
        let settings = ApiSettings::default();
        let submitter = HttpOrderSubmitter::new(&settings).unwrap();
        assert_eq!(submitter.endpoint(), settings.order_endpoint);
    }
}
