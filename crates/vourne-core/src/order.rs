//! # Order Payload
//!
//! Committed checkout data and the snapshot handed to the order backend.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CustomerInfo ──┐                                                       │
//! │  ShippingInfo ──┤                                                       │
//! │  Address (bill) ┼──► OrderPayload::assemble() ──► OrderSubmitter        │
//! │  PaymentInfo  ──┤        (immutable snapshot)      (ownership moves)    │
//! │  Cart lines   ──┘                                                       │
//! │                                                                         │
//! │  Card number and CVC never enter PaymentInfo: only the cardholder       │
//! │  name and the last four digits are kept.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::totals::Totals;
use crate::types::{LineItem, PaymentMethod, ShippingMethod};

// =============================================================================
// Committed Step Data
// =============================================================================

/// Step 1, as accepted by the last successful advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
}

impl CustomerInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    /// ISO country code, upper-case.
    pub country: String,
}

/// Step 2: where and how the order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[serde(flatten)]
    pub address: Address,
    pub method: ShippingMethod,
}

/// Step 3, without card secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
}

impl PaymentInfo {
    /// Keeps the cardholder name and the last four digits of `card_number`.
    pub fn card(card_number: &str, card_name: &str) -> Self {
        let digits: Vec<char> = card_number.chars().filter(char::is_ascii_digit).collect();
        let last_four: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        PaymentInfo {
            method: PaymentMethod::Card,
            card_name: Some(card_name.trim().to_string()),
            card_last_four: Some(last_four),
        }
    }

    pub fn without_card(method: PaymentMethod) -> Self {
        PaymentInfo {
            method,
            card_name: None,
            card_last_four: None,
        }
    }
}

// =============================================================================
// Order Payload
// =============================================================================

/// Everything the backend needs to create the order.
///
/// Built once from committed data; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    reference: Uuid,
    created_at: DateTime<Utc>,
    customer: CustomerInfo,
    shipping: ShippingInfo,
    billing: Address,
    payment: PaymentInfo,
    terms_accepted: bool,
    items: Vec<LineItem>,
    totals: Totals,
}

impl OrderPayload {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        reference: Uuid,
        customer: CustomerInfo,
        shipping: ShippingInfo,
        billing: Address,
        payment: PaymentInfo,
        terms_accepted: bool,
        items: Vec<LineItem>,
        totals: Totals,
    ) -> Self {
        OrderPayload {
            reference,
            created_at: Utc::now(),
            customer,
            shipping,
            billing,
            payment,
            terms_accepted,
            items,
            totals: totals.rounded(),
        }
    }

    /// Checkout session reference, stable across retries.
    pub fn reference(&self) -> Uuid {
        self.reference
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn customer(&self) -> &CustomerInfo {
        &self.customer
    }

    pub fn shipping(&self) -> &ShippingInfo {
        &self.shipping
    }

    pub fn billing(&self) -> &Address {
        &self.billing
    }

    pub fn payment(&self) -> &PaymentInfo {
        &self.payment
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Rounded totals.
    pub fn totals(&self) -> &Totals {
        &self.totals
    }
}

/// What the backend answers for an accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    /// e.g. `VOURNE-20260314-4821`.
    pub order_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    #[test]
    fn test_card_payment_keeps_only_last_four() {
        let payment = PaymentInfo::card("4111 1111 1111 1234", " Ana Pérez ");
        assert_eq!(payment.card_last_four.as_deref(), Some("1234"));
        assert_eq!(payment.card_name.as_deref(), Some("Ana Pérez"));

        let json = serde_json::to_string(&payment).unwrap();
        assert!(!json.contains("4111"));
    }

    #[test]
    fn test_short_card_number_does_not_panic() {
        let payment = PaymentInfo::card("12", "X");
        assert_eq!(payment.card_last_four.as_deref(), Some("12"));
    }

    #[test]
    fn test_payload_rounds_totals() {
        let totals = Totals {
            subtotal: Money::from_cents(4990),
            tax: "10.479".parse().unwrap(),
            shipping: Money::from_cents(495),
            total: "65.369".parse().unwrap(),
        };
        let address = Address {
            address: "Gran Vía 1".into(),
            city: "Madrid".into(),
            postal_code: "28013".into(),
            country: "ES".into(),
        };
        let payload = OrderPayload::assemble(
            Uuid::new_v4(),
            CustomerInfo {
                email: "ana@correo.es".into(),
                phone: "+34 612 345 678".into(),
                first_name: "Ana".into(),
                last_name: "Pérez".into(),
            },
            ShippingInfo {
                address: address.clone(),
                method: ShippingMethod::Standard,
            },
            address,
            PaymentInfo::without_card(PaymentMethod::PayPal),
            true,
            Vec::new(),
            totals,
        );
        assert_eq!(payload.totals().tax, Money::from_cents(1048));
        assert_eq!(payload.totals().total, Money::from_cents(6533));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["shipping"]["postalCode"], "28013");
        assert_eq!(json["shipping"]["method"], "standard");
        assert_eq!(json["payment"]["method"], "paypal");
    }
}
