//! # Validation Module
//!
//! Input validation for the cart and the checkout form.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Cart input                                                    │
//! │  └── validate_required / validate_unit_price / validate_quantity        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Checkout fields (FIELD_RULES table)                           │
//! │  ├── Field → [Check, Check, ...]   evaluated in order, first failure    │
//! │  ├── used by validate_field (blur) AND by the step validators           │
//! │  └── CheckoutRules: configurable parts (countries, postal patterns)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend (process-order)                                       │
//! │  └── Re-validates; rejections come back as SubmissionError::Rejected    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vourne_core::validation::{is_valid_email, luhn_valid, validate_quantity};
//!
//! assert!(is_valid_email("ana@example.es"));
//! assert!(luhn_valid("4111111111111111"));
//! assert!(validate_quantity(5).is_ok());
//! ```

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::form::{CheckoutForm, Field};
use crate::money::Money;
use crate::types::TaxRate;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"));

static CVC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,4}$").expect("Invalid regex"));

// =============================================================================
// Cart Input Validators
// =============================================================================

/// Validates that a text value is present.
///
/// ```rust
/// use vourne_core::validation::validate_required;
///
/// assert!(validate_required("Name", "Camisa").is_ok());
/// assert!(validate_required("Name", "   ").is_err());
/// ```
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required("Name", name)?;

    if name.trim().chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "Name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a line quantity.
///
/// ## Rules
/// - Must be between 1 and MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 || qty > MAX_ITEM_QUANTITY as i64 {
        return Err(ValidationError::OutOfRange {
            field: "Quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY as i64,
        });
    }
    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Must be strictly positive (free items are not sold through the cart)
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "Price".to_string(),
        });
    }
    Ok(())
}

/// Validates a shipping cost from configuration.
pub fn validate_shipping_cost(field: &str, cost: Money) -> ValidationResult<()> {
    if cost.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > TaxRate::BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "Tax rate".to_string(),
            min: 0,
            max: TaxRate::BPS_SCALE as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Format Checks
// =============================================================================

/// Something@something.tld, no whitespace.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

/// Luhn checksum over a digits-only string of 13 to 19 digits.
///
/// ```rust
/// use vourne_core::validation::luhn_valid;
///
/// assert!(luhn_valid("4242424242424242"));
/// assert!(!luhn_valid("4242424242424241"));
/// assert!(!luhn_valid("4242"));
/// ```
pub fn luhn_valid(digits: &str) -> bool {
    let len = digits.len();
    if !(13..=19).contains(&len) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Card number with the usual separators removed.
pub fn normalize_card_number(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Parses `MM/YY` or `MM/YYYY` into `(year, month)`.
pub fn parse_card_expiry(value: &str) -> Option<(i32, u32)> {
    let (month, year) = value.trim().split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let year = year.trim();
    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, month))
}

/// A card is valid through the last day of its expiry month.
pub fn card_expiry_valid(value: &str, today: NaiveDate) -> bool {
    match parse_card_expiry(value) {
        Some((year, month)) => (year, month) >= (today.year(), today.month()),
        None => false,
    }
}

// =============================================================================
// Checkout Settings (configurable rules)
// =============================================================================

fn default_min_phone_length() -> usize {
    10
}

fn default_countries() -> Vec<String> {
    ["ES", "PT", "FR", "DE", "IT", "NL", "BE", "IE"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_postal_codes() -> BTreeMap<String, String> {
    [
        ("ES", r"^\d{5}$"),
        ("PT", r"^\d{4}-?\d{3}$"),
        ("FR", r"^\d{5}$"),
        ("DE", r"^\d{5}$"),
        ("IT", r"^\d{5}$"),
        ("NL", r"^\d{4}\s?[A-Za-z]{2}$"),
        ("BE", r"^\d{4}$"),
        ("IE", r"^[A-Za-z0-9]{3}\s?[A-Za-z0-9]{4}$"),
    ]
    .iter()
    .map(|(country, pattern)| (country.to_string(), pattern.to_string()))
    .collect()
}

fn default_fallback_postal_code() -> String {
    r"^\d{4,5}$".to_string()
}

/// The checkout rules a store can tune (the `[checkout]` config section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Minimum phone length, counting digits, spaces, dashes and parentheses.
    #[serde(default = "default_min_phone_length")]
    pub min_phone_length: usize,

    /// ISO country codes the store ships to.
    #[serde(default = "default_countries")]
    pub countries: Vec<String>,

    /// Country code → postal code regex.
    #[serde(default = "default_postal_codes")]
    pub postal_codes: BTreeMap<String, String>,

    /// Pattern for countries without an entry in `postal_codes`.
    #[serde(default = "default_fallback_postal_code")]
    pub fallback_postal_code: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            min_phone_length: default_min_phone_length(),
            countries: default_countries(),
            postal_codes: default_postal_codes(),
            fallback_postal_code: default_fallback_postal_code(),
        }
    }
}

// =============================================================================
// Field Rule Table
// =============================================================================

/// One kind of field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Non-empty text.
    Required,
    Email,
    Phone,
    /// Postal code, pattern chosen by the value of the given country field.
    PostalCode(Field),
    /// One of the configured delivery countries.
    Country,
    CardNumber,
    CardExpiry,
    CardCvc,
    /// A method was chosen (radio group).
    Selected,
    /// A checkbox is ticked.
    Accepted,
}

impl Check {
    /// Reason shown for format failures.
    pub fn reason(&self) -> &'static str {
        match self {
            Check::Email => "must look like name@example.com",
            Check::Phone => "must be a phone number with enough digits",
            Check::PostalCode(_) => "does not match the format for this country",
            Check::CardNumber => "is not a valid card number",
            Check::CardExpiry => "must be MM/YY and not in the past",
            Check::CardCvc => "must be 3 or 4 digits",
            Check::Required | Check::Country | Check::Selected | Check::Accepted => "",
        }
    }
}

/// The checks for one field, evaluated in order.
#[derive(Debug)]
pub struct FieldRule {
    pub field: Field,
    pub checks: &'static [Check],
}

/// Field-level rules for the whole checkout.
pub static FIELD_RULES: &[FieldRule] = &[
    // Step 1: customer
    FieldRule { field: Field::Email, checks: &[Check::Required, Check::Email] },
    FieldRule { field: Field::Phone, checks: &[Check::Required, Check::Phone] },
    FieldRule { field: Field::FirstName, checks: &[Check::Required] },
    FieldRule { field: Field::LastName, checks: &[Check::Required] },
    // Step 2: shipping
    FieldRule { field: Field::ShippingAddress, checks: &[Check::Required] },
    FieldRule { field: Field::ShippingCity, checks: &[Check::Required] },
    FieldRule {
        field: Field::ShippingPostalCode,
        checks: &[Check::Required, Check::PostalCode(Field::ShippingCountry)],
    },
    FieldRule { field: Field::ShippingCountry, checks: &[Check::Required, Check::Country] },
    FieldRule { field: Field::ShippingMethod, checks: &[Check::Selected] },
    FieldRule { field: Field::BillingAddress, checks: &[Check::Required] },
    FieldRule { field: Field::BillingCity, checks: &[Check::Required] },
    FieldRule {
        field: Field::BillingPostalCode,
        checks: &[Check::Required, Check::PostalCode(Field::BillingCountry)],
    },
    FieldRule { field: Field::BillingCountry, checks: &[Check::Required, Check::Country] },
    // Step 3: payment
    FieldRule { field: Field::PaymentMethod, checks: &[Check::Selected] },
    FieldRule { field: Field::CardNumber, checks: &[Check::Required, Check::CardNumber] },
    FieldRule { field: Field::CardExpiry, checks: &[Check::Required, Check::CardExpiry] },
    FieldRule { field: Field::CardCvc, checks: &[Check::Required, Check::CardCvc] },
    FieldRule { field: Field::CardName, checks: &[Check::Required] },
    FieldRule { field: Field::AcceptTerms, checks: &[Check::Accepted] },
];

/// The checks registered for `field`.
pub fn checks_for(field: Field) -> &'static [Check] {
    FIELD_RULES
        .iter()
        .find(|rule| rule.field == field)
        .map(|rule| rule.checks)
        .unwrap_or(&[])
}

// =============================================================================
// Checkout Rules (compiled settings)
// =============================================================================

static DEFAULT_RULES: Lazy<CheckoutRules> = Lazy::new(|| {
    CheckoutRules::new(&CheckoutSettings::default()).expect("Invalid default checkout rules")
});

/// [`CheckoutSettings`] with every pattern compiled.
#[derive(Debug, Clone)]
pub struct CheckoutRules {
    phone: Regex,
    countries: Vec<String>,
    postal_codes: BTreeMap<String, Regex>,
    fallback_postal_code: Regex,
}

impl Default for CheckoutRules {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

impl CheckoutRules {
    /// Compiles the settings, failing on the first bad pattern.
    pub fn new(settings: &CheckoutSettings) -> ValidationResult<Self> {
        let phone = Regex::new(&format!(r"^\+?[\d\s\-()]{{{},}}$", settings.min_phone_length))
            .map_err(|e| ValidationError::invalid("Phone pattern", e.to_string()))?;

        let mut postal_codes = BTreeMap::new();
        for (country, pattern) in &settings.postal_codes {
            let regex = Regex::new(pattern).map_err(|e| {
                ValidationError::invalid(format!("Postal code pattern for {}", country), e.to_string())
            })?;
            postal_codes.insert(country.trim().to_ascii_uppercase(), regex);
        }

        let fallback_postal_code = Regex::new(&settings.fallback_postal_code)
            .map_err(|e| ValidationError::invalid("Fallback postal code pattern", e.to_string()))?;

        if settings.countries.is_empty() {
            return Err(ValidationError::required("Delivery countries"));
        }

        Ok(CheckoutRules {
            phone,
            countries: settings
                .countries
                .iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .collect(),
            postal_codes,
            fallback_postal_code,
        })
    }

    /// Configured delivery countries, upper-case.
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn is_supported_country(&self, code: &str) -> bool {
        let code = code.trim().to_ascii_uppercase();
        self.countries.iter().any(|c| *c == code)
    }

    pub fn postal_code_valid(&self, country: &str, postal_code: &str) -> bool {
        let country = country.trim().to_ascii_uppercase();
        self.postal_codes
            .get(&country)
            .unwrap_or(&self.fallback_postal_code)
            .is_match(postal_code.trim())
    }

    pub fn phone_valid(&self, phone: &str) -> bool {
        self.phone.is_match(phone.trim())
    }

    /// Runs every check registered for `field` against the draft form.
    ///
    /// `today` is only consulted by the card expiry check.
    pub fn check_field(
        &self,
        field: Field,
        form: &CheckoutForm,
        today: NaiveDate,
    ) -> ValidationResult<()> {
        for check in checks_for(field) {
            self.evaluate(*check, field, form, today)?;
        }
        Ok(())
    }

    fn evaluate(
        &self,
        check: Check,
        field: Field,
        form: &CheckoutForm,
        today: NaiveDate,
    ) -> ValidationResult<()> {
        let value = form.text(field);
        let passed = match check {
            Check::Required => return validate_required(field.label(), value),
            Check::Selected => {
                let selected = match field {
                    Field::ShippingMethod => form.shipping_method().is_some(),
                    Field::PaymentMethod => form.payment_method().is_some(),
                    _ => !value.is_empty(),
                };
                if !selected {
                    return Err(ValidationError::required(field.label()));
                }
                true
            }
            Check::Accepted => {
                if !form.terms_accepted() {
                    return Err(ValidationError::MustAccept {
                        field: field.label().to_string(),
                    });
                }
                true
            }
            Check::Country => {
                if !self.is_supported_country(value) {
                    return Err(ValidationError::NotAllowed {
                        field: field.label().to_string(),
                        allowed: self.countries.clone(),
                    });
                }
                true
            }
            Check::Email => is_valid_email(value),
            Check::Phone => self.phone_valid(value),
            Check::PostalCode(country_field) => {
                self.postal_code_valid(form.text(country_field), value)
            }
            Check::CardNumber => luhn_valid(&normalize_card_number(value)),
            Check::CardExpiry => card_expiry_valid(value, today),
            Check::CardCvc => CVC.is_match(value),
        };

        if passed {
            Ok(())
        } else {
            Err(ValidationError::invalid(field.label(), check.reason()))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
