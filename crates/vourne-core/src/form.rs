//! # Checkout Form
//!
//! Field names, draft values and the per-field error map.
//!
//! ## Draft vs Committed
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  set_field("email", "ana@")    ──► CheckoutForm (draft, editable)       │
//! │                                          │                              │
//! │                                   advance() passes                      │
//! │                                          ▼                              │
//! │                              CustomerInfo (committed, see order.rs)     │
//! │                                                                         │
//! │  Only committed data reaches the OrderPayload.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::checkout::CheckoutStep;
use crate::error::ValidationError;
use crate::types::{PaymentMethod, ShippingMethod};

// =============================================================================
// Field
// =============================================================================

/// Every input the checkout validates.
///
/// Serialized names are the storefront's form ids (`first_name`,
/// `shipping_postal_code`, ...). Selections (`shipping_method`,
/// `payment_method`, `accept_terms`) are fields too, so their errors live in
/// the same map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Email,
    Phone,
    FirstName,
    LastName,
    ShippingAddress,
    ShippingCity,
    ShippingPostalCode,
    ShippingCountry,
    ShippingMethod,
    BillingAddress,
    BillingCity,
    BillingPostalCode,
    BillingCountry,
    PaymentMethod,
    CardNumber,
    CardExpiry,
    CardCvc,
    CardName,
    AcceptTerms,
}

impl Field {
    pub const ALL: [Field; 19] = [
        Field::Email,
        Field::Phone,
        Field::FirstName,
        Field::LastName,
        Field::ShippingAddress,
        Field::ShippingCity,
        Field::ShippingPostalCode,
        Field::ShippingCountry,
        Field::ShippingMethod,
        Field::BillingAddress,
        Field::BillingCity,
        Field::BillingPostalCode,
        Field::BillingCountry,
        Field::PaymentMethod,
        Field::CardNumber,
        Field::CardExpiry,
        Field::CardCvc,
        Field::CardName,
        Field::AcceptTerms,
    ];

    /// Shipping address fields, in the order they are copied to billing.
    pub const SHIPPING_ADDRESS: [Field; 4] = [
        Field::ShippingAddress,
        Field::ShippingCity,
        Field::ShippingPostalCode,
        Field::ShippingCountry,
    ];

    pub const BILLING_ADDRESS: [Field; 4] = [
        Field::BillingAddress,
        Field::BillingCity,
        Field::BillingPostalCode,
        Field::BillingCountry,
    ];

    pub const CARD: [Field; 4] = [
        Field::CardNumber,
        Field::CardExpiry,
        Field::CardCvc,
        Field::CardName,
    ];

    /// The form id.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Email => "email",
            Field::Phone => "phone",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::ShippingAddress => "shipping_address",
            Field::ShippingCity => "shipping_city",
            Field::ShippingPostalCode => "shipping_postal_code",
            Field::ShippingCountry => "shipping_country",
            Field::ShippingMethod => "shipping_method",
            Field::BillingAddress => "billing_address",
            Field::BillingCity => "billing_city",
            Field::BillingPostalCode => "billing_postal_code",
            Field::BillingCountry => "billing_country",
            Field::PaymentMethod => "payment_method",
            Field::CardNumber => "card_number",
            Field::CardExpiry => "card_expiry",
            Field::CardCvc => "card_cvc",
            Field::CardName => "card_name",
            Field::AcceptTerms => "accept_terms",
        }
    }

    /// Human label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Email => "Email",
            Field::Phone => "Phone",
            Field::FirstName => "First name",
            Field::LastName => "Last name",
            Field::ShippingAddress => "Address",
            Field::ShippingCity => "City",
            Field::ShippingPostalCode => "Postal code",
            Field::ShippingCountry => "Country",
            Field::ShippingMethod => "Shipping method",
            Field::BillingAddress => "Billing address",
            Field::BillingCity => "Billing city",
            Field::BillingPostalCode => "Billing postal code",
            Field::BillingCountry => "Billing country",
            Field::PaymentMethod => "Payment method",
            Field::CardNumber => "Card number",
            Field::CardExpiry => "Expiry date",
            Field::CardCvc => "CVC",
            Field::CardName => "Cardholder name",
            Field::AcceptTerms => "Terms and conditions",
        }
    }

    /// The step whose validator owns this field.
    pub fn step(&self) -> CheckoutStep {
        match self {
            Field::Email | Field::Phone | Field::FirstName | Field::LastName => {
                CheckoutStep::CustomerInfo
            }
            Field::ShippingAddress
            | Field::ShippingCity
            | Field::ShippingPostalCode
            | Field::ShippingCountry
            | Field::ShippingMethod
            | Field::BillingAddress
            | Field::BillingCity
            | Field::BillingPostalCode
            | Field::BillingCountry => CheckoutStep::Shipping,
            Field::PaymentMethod
            | Field::CardNumber
            | Field::CardExpiry
            | Field::CardCvc
            | Field::CardName
            | Field::AcceptTerms => CheckoutStep::Payment,
        }
    }

    /// Free-text inputs (everything except the three selections).
    pub fn is_text(&self) -> bool {
        !matches!(
            self,
            Field::ShippingMethod | Field::PaymentMethod | Field::AcceptTerms
        )
    }

    pub fn is_billing(&self) -> bool {
        Field::BILLING_ADDRESS.contains(self)
    }

    /// Shipping field → matching billing field.
    pub fn billing_counterpart(&self) -> Option<Field> {
        match self {
            Field::ShippingAddress => Some(Field::BillingAddress),
            Field::ShippingCity => Some(Field::BillingCity),
            Field::ShippingPostalCode => Some(Field::BillingPostalCode),
            Field::ShippingCountry => Some(Field::BillingCountry),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| ValidationError::invalid("Field", format!("unknown field '{}'", s)))
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Field → message map shown next to the inputs.
///
/// Ordered by field so the presentation (and tests) see a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: Field) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    /// Drops every entry owned by `step`.
    pub fn clear_step(&mut self, step: CheckoutStep) {
        self.0.retain(|field, _| field.step() != step);
    }

    /// Adds all entries from `other`, replacing existing ones.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// Records a validation failure under `field`.
    pub fn record(&mut self, field: Field, error: &ValidationError) {
        self.insert(field, error.to_string());
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

// =============================================================================
// Checkout Form (drafts)
// =============================================================================

/// Everything the shopper has typed or selected, validated or not.
#[derive(Clone)]
pub struct CheckoutForm {
    values: BTreeMap<Field, String>,
    shipping_method: Option<ShippingMethod>,
    payment_method: Option<PaymentMethod>,
    terms_accepted: bool,
    billing_same_as_shipping: bool,
}

impl Default for CheckoutForm {
    fn default() -> Self {
        CheckoutForm {
            values: BTreeMap::new(),
            shipping_method: None,
            payment_method: None,
            terms_accepted: false,
            billing_same_as_shipping: true,
        }
    }
}

impl CheckoutForm {
    /// Draft value of a text field, trimmed. Empty when never set.
    pub fn text(&self, field: Field) -> &str {
        self.values.get(&field).map(|v| v.trim()).unwrap_or("")
    }

    pub(crate) fn set_text(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn shipping_method(&self) -> Option<ShippingMethod> {
        self.shipping_method
    }

    pub(crate) fn set_shipping_method(&mut self, method: ShippingMethod) {
        self.shipping_method = Some(method);
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub(crate) fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = Some(method);
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted
    }

    pub(crate) fn set_terms_accepted(&mut self, accepted: bool) {
        self.terms_accepted = accepted;
    }

    pub fn billing_same_as_shipping(&self) -> bool {
        self.billing_same_as_shipping
    }

    /// Card fields only matter when paying by card.
    pub fn card_fields_visible(&self) -> bool {
        self.payment_method
            .map(|m| m.requires_card_details())
            .unwrap_or(false)
    }

    /// Toggles the billing mirror. Enabling copies every non-empty shipping
    /// value into billing once; disabling leaves billing as it is.
    pub(crate) fn set_billing_same_as_shipping(&mut self, same: bool) {
        if same && !self.billing_same_as_shipping {
            for field in Field::SHIPPING_ADDRESS {
                let value = self.text(field).to_string();
                if let Some(billing) = field.billing_counterpart() {
                    if !value.is_empty() {
                        self.values.insert(billing, value);
                    }
                }
            }
        }
        self.billing_same_as_shipping = same;
    }
}

impl fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: BTreeMap<Field, &str> = self
            .values
            .iter()
            .map(|(field, value)| match field {
                Field::CardNumber | Field::CardCvc => (*field, "<redacted>"),
                _ => (*field, value.as_str()),
            })
            .collect();
        f.debug_struct("CheckoutForm")
            .field("values", &values)
            .field("shipping_method", &self.shipping_method)
            .field("payment_method", &self.payment_method)
            .field("terms_accepted", &self.terms_accepted)
            .field("billing_same_as_shipping", &self.billing_same_as_shipping)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
