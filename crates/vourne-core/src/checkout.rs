//! # Checkout State Machine
//!
//! Linear, gated checkout layered on the [`CartStore`].
//!
//! ## Step Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout Steps                                    │
//! │                                                                         │
//! │   ┌──────────────┐ advance ┌──────────────┐ advance ┌──────────────┐    │
//! │   │ 1 Customer   │ ──────► │ 2 Shipping   │ ──────► │ 3 Payment    │    │
//! │   │ email, phone │ ◄────── │ address,     │ ◄────── │ method, card │    │
//! │   │ names        │ retreat │ method,      │ retreat │ terms        │    │
//! │   └──────────────┘         │ billing      │         └──────┬───────┘    │
//! │                            └──────────────┘                │            │
//! │                                          submit() / advance()           │
//! │                                                            ▼            │
//! │                                                   ┌──────────────┐      │
//! │                                                   │  Submitted   │      │
//! │                                                   │ order_number │      │
//! │                                                   └──────────────┘      │
//! │                                                                         │
//! │  advance: validate draft ─► fail: errors, stay                          │
//! │                           └► pass: commit draft, clear errors, next     │
//! │  retreat: never validates, never clears committed data                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submission
//! `submit()` validates the payment step plus the cross-step checks, builds
//! the [`OrderPayload`] from committed data and awaits the
//! [`OrderSubmitter`]. Nothing in the session or the cart changes until the
//! submitter answers with success, so a failed, cancelled or dropped
//! submission leaves everything as it was.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::{CartStore, CartSummary};
use crate::error::{CheckoutError, CheckoutResult, ValidationError};
use crate::form::{CheckoutForm, Field, ValidationErrors};
use crate::order::{Address, CustomerInfo, OrderConfirmation, OrderPayload, PaymentInfo, ShippingInfo};
use crate::submission::{EmailAvailability, OrderSubmitter};
use crate::totals::Totals;
use crate::types::{PaymentMethod, ShippingMethod};
use crate::validation::{CheckoutRules, ValidationResult};

// =============================================================================
// Checkout Step
// =============================================================================

/// The three checkout steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    CustomerInfo,
    Shipping,
    Payment,
}

impl CheckoutStep {
    pub const FIRST: CheckoutStep = CheckoutStep::CustomerInfo;
    pub const LAST: CheckoutStep = CheckoutStep::Payment;
    pub const COUNT: u8 = 3;

    /// 1-based position.
    pub fn number(&self) -> u8 {
        match self {
            CheckoutStep::CustomerInfo => 1,
            CheckoutStep::Shipping => 2,
            CheckoutStep::Payment => 3,
        }
    }

    pub fn next(&self) -> Option<CheckoutStep> {
        match self {
            CheckoutStep::CustomerInfo => Some(CheckoutStep::Shipping),
            CheckoutStep::Shipping => Some(CheckoutStep::Payment),
            CheckoutStep::Payment => None,
        }
    }

    pub fn previous(&self) -> Option<CheckoutStep> {
        match self {
            CheckoutStep::CustomerInfo => None,
            CheckoutStep::Shipping => Some(CheckoutStep::CustomerInfo),
            CheckoutStep::Payment => Some(CheckoutStep::Shipping),
        }
    }

    /// Progress bar fill: 0, 50, 100.
    pub fn progress_percent(&self) -> u8 {
        (self.number() - 1) * 100 / (Self::COUNT - 1)
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckoutStep::CustomerInfo => "customer information",
            CheckoutStep::Shipping => "shipping",
            CheckoutStep::Payment => "payment",
        })
    }
}

// =============================================================================
// Status / Outcomes
// =============================================================================

/// Whether the session already produced an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckoutStatus {
    InProgress,
    Submitted { order_number: String },
}

/// Result of a successful [`CheckoutSession::advance`].
#[derive(Debug)]
pub enum Advance {
    /// Moved to the next step.
    Moved(CheckoutStep),
    /// Past the last step: the order is ready to hand off.
    Ready(OrderPayload),
}

#[derive(Debug, Clone, Default)]
struct Committed {
    customer: Option<CustomerInfo>,
    shipping: Option<ShippingInfo>,
    billing: Option<Address>,
    payment: Option<PaymentInfo>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// =============================================================================
// Checkout Session
// =============================================================================

/// One pass through the checkout. Never persisted.
///
/// The session does not own the cart: every call that needs cart data takes
/// the [`CartStore`] as an argument.
#[derive(Debug)]
pub struct CheckoutSession {
    reference: Uuid,
    step: CheckoutStep,
    status: CheckoutStatus,
    form: CheckoutForm,
    errors: ValidationErrors,
    committed: Committed,
    rules: CheckoutRules,
}

impl CheckoutSession {
    /// Starts a checkout for a non-empty cart.
    pub fn begin(cart: &CartStore, rules: CheckoutRules) -> CheckoutResult<Self> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let session = CheckoutSession {
            reference: Uuid::new_v4(),
            step: CheckoutStep::FIRST,
            status: CheckoutStatus::InProgress,
            form: CheckoutForm::default(),
            errors: ValidationErrors::new(),
            committed: Committed::default(),
            rules,
        };

        info!(
            reference = %session.reference,
            lines = cart.line_count(),
            items = cart.item_count(),
            "Checkout started"
        );
        Ok(session)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn reference(&self) -> Uuid {
        self.reference
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn status(&self) -> &CheckoutStatus {
        &self.status
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.status, CheckoutStatus::Submitted { .. })
    }

    pub fn form(&self) -> &CheckoutForm {
        &self.form
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn rules(&self) -> &CheckoutRules {
        &self.rules
    }

    pub fn customer(&self) -> Option<&CustomerInfo> {
        self.committed.customer.as_ref()
    }

    pub fn shipping(&self) -> Option<&ShippingInfo> {
        self.committed.shipping.as_ref()
    }

    pub fn billing(&self) -> Option<&Address> {
        self.committed.billing.as_ref()
    }

    pub fn payment(&self) -> Option<&PaymentInfo> {
        self.committed.payment.as_ref()
    }

    /// Totals for the currently selected shipping method.
    pub fn totals(&self, cart: &CartStore) -> Totals {
        cart.totals(self.form.shipping_method())
    }

    /// Whether `advance()` would pass right now. Touches no state.
    pub fn can_advance(&self, cart: &CartStore) -> bool {
        if self.is_submitted() {
            return false;
        }
        let today = today();
        let mut errors = self.validate_step_on(self.step, today);
        if self.step == CheckoutStep::LAST {
            errors.merge(self.cross_step_errors(today));
        }
        errors.is_empty() && !cart.is_empty()
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    /// Sets a text field's draft value and clears its error.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) -> CheckoutResult<()> {
        self.ensure_open()?;
        if !field.is_text() {
            return Err(CheckoutError::NotATextField(field));
        }
        if field.is_billing() && self.form.billing_same_as_shipping() {
            return Err(CheckoutError::FieldHidden(field));
        }

        self.form.set_text(field, value);
        self.errors.remove(field);
        Ok(())
    }

    /// Validates one field (on blur), raising or clearing only its entry.
    pub fn validate_field(&mut self, field: Field) -> ValidationResult<()> {
        self.validate_field_on(field, today())
    }

    /// [`CheckoutSession::validate_field`] with an explicit date for the
    /// card expiry check.
    pub fn validate_field_on(&mut self, field: Field, today: NaiveDate) -> ValidationResult<()> {
        let result = self.rules.check_field(field, &self.form, today);
        match &result {
            Ok(()) => {
                self.errors.remove(field);
            }
            Err(e) => self.errors.record(field, e),
        }
        result
    }

    /// Picks a shipping method and returns the recomputed totals.
    ///
    /// After the shipping step is committed, the committed method follows
    /// the selection as well.
    pub fn select_shipping_method(
        &mut self,
        method: ShippingMethod,
        cart: &CartStore,
    ) -> CheckoutResult<Totals> {
        self.ensure_open()?;
        self.form.set_shipping_method(method);
        self.errors.remove(Field::ShippingMethod);
        if let Some(shipping) = self.committed.shipping.as_mut() {
            shipping.method = method;
        }
        let totals = self.totals(cart);
        debug!(%method, total = %totals.total, "Shipping method selected");
        Ok(totals)
    }

    /// Picks a payment method. Leaving card payment drops the card errors.
    pub fn select_payment_method(&mut self, method: PaymentMethod) -> CheckoutResult<()> {
        self.ensure_open()?;
        self.form.set_payment_method(method);
        self.errors.remove(Field::PaymentMethod);
        if !method.requires_card_details() {
            for field in Field::CARD {
                self.errors.remove(field);
            }
        }
        debug!(%method, "Payment method selected");
        Ok(())
    }

    pub fn set_terms_accepted(&mut self, accepted: bool) -> CheckoutResult<()> {
        self.ensure_open()?;
        self.form.set_terms_accepted(accepted);
        if accepted {
            self.errors.remove(Field::AcceptTerms);
        }
        Ok(())
    }

    /// Enabling copies the non-empty shipping values into billing once and
    /// hides billing; disabling shows billing again without clearing it.
    pub fn set_billing_same_as_shipping(&mut self, same: bool) -> CheckoutResult<()> {
        self.ensure_open()?;
        self.form.set_billing_same_as_shipping(same);
        if same {
            for field in Field::BILLING_ADDRESS {
                self.errors.remove(field);
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Validates the current step and moves forward.
    ///
    /// On the last step this runs the cross-step checks and returns the
    /// finalized payload instead of moving.
    pub fn advance(&mut self, cart: &CartStore) -> CheckoutResult<Advance> {
        self.advance_on(cart, today())
    }

    /// [`CheckoutSession::advance`] with an explicit date for the card
    /// expiry check.
    pub fn advance_on(&mut self, cart: &CartStore, today: NaiveDate) -> CheckoutResult<Advance> {
        self.ensure_open()?;
        let step = self.step;

        let Some(next) = step.next() else {
            let (payload, payment) = self.prepare(cart, today)?;
            self.committed.payment = Some(payment);
            self.errors.clear_step(step);
            info!(reference = %self.reference, "Checkout finalized");
            return Ok(Advance::Ready(payload));
        };

        self.gate(step, today)?;
        self.commit(step);
        self.step = next;
        debug!(reference = %self.reference, from = %step, to = %next, "Checkout advanced");
        Ok(Advance::Moved(next))
    }

    /// Like [`CheckoutSession::advance`], additionally asking `remote`
    /// whether the email is available when leaving the first step.
    pub async fn advance_verified<R>(&mut self, cart: &CartStore, remote: &R) -> CheckoutResult<Advance>
    where
        R: EmailAvailability + ?Sized,
    {
        self.ensure_open()?;
        let today = today();
        if self.step != CheckoutStep::CustomerInfo {
            return self.advance_on(cart, today);
        }

        // local rules first; no point asking about a malformed address
        self.gate(CheckoutStep::CustomerInfo, today)?;

        let email = self.form.text(Field::Email).to_string();
        match remote.is_email_available(&email).await {
            Ok(true) => self.advance_on(cart, today),
            Ok(false) => {
                let error = ValidationError::Duplicate {
                    field: Field::Email.label().to_string(),
                    value: email,
                };
                self.errors.record(Field::Email, &error);
                let mut errors = ValidationErrors::new();
                errors.record(Field::Email, &error);
                debug!(reference = %self.reference, "Email already registered");
                Err(CheckoutError::StepRejected {
                    step: CheckoutStep::CustomerInfo,
                    errors,
                })
            }
            Err(e) => {
                warn!(reference = %self.reference, error = %e, "Email availability check failed");
                Err(CheckoutError::Submission(e))
            }
        }
    }

    /// Goes back one step, keeping all data.
    pub fn retreat(&mut self) -> CheckoutResult<CheckoutStep> {
        self.ensure_open()?;
        let previous = self.step.previous().ok_or(CheckoutError::AtFirstStep)?;
        debug!(reference = %self.reference, from = %self.step, to = %previous, "Checkout retreated");
        self.step = previous;
        Ok(previous)
    }

    // -------------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------------

    /// Finalizes the order and hands it to `submitter`.
    ///
    /// On success the session becomes `Submitted` and the cart is cleared.
    /// Dropping the returned future before it completes changes nothing.
    pub async fn submit<S>(
        &mut self,
        cart: &mut CartStore,
        submitter: &S,
    ) -> CheckoutResult<OrderConfirmation>
    where
        S: OrderSubmitter + ?Sized,
    {
        self.submit_until(cart, submitter, std::future::pending::<()>())
            .await
    }

    /// [`CheckoutSession::submit`], abandoned with `Cancelled` as soon as
    /// `cancel` completes.
    pub async fn submit_until<S, C>(
        &mut self,
        cart: &mut CartStore,
        submitter: &S,
        cancel: C,
    ) -> CheckoutResult<OrderConfirmation>
    where
        S: OrderSubmitter + ?Sized,
        C: Future<Output = ()>,
    {
        self.ensure_open()?;
        if self.step != CheckoutStep::LAST {
            return Err(CheckoutError::NotAtFinalStep { step: self.step });
        }

        let (payload, payment) = self.prepare(cart, today())?;
        let reference = self.reference;
        debug!(%reference, total = %payload.totals().total, "Submitting order");

        let outcome = tokio::select! {
            biased;
            _ = cancel => {
                info!(%reference, "Order submission cancelled");
                return Err(CheckoutError::Cancelled);
            }
            result = submitter.submit(payload) => result,
        };

        match outcome {
            Ok(confirmation) => {
                self.committed.payment = Some(payment);
                self.errors = ValidationErrors::new();
                self.status = CheckoutStatus::Submitted {
                    order_number: confirmation.order_number.clone(),
                };
                cart.clear();
                info!(%reference, order_number = %confirmation.order_number, "Order submitted");
                Ok(confirmation)
            }
            Err(e) => {
                warn!(%reference, error = %e, retryable = e.is_retryable(), "Order submission failed");
                Err(CheckoutError::Submission(e))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Presentation
    // -------------------------------------------------------------------------

    /// Everything the checkout page renders.
    pub fn view(&self, cart: &CartStore) -> CheckoutView {
        CheckoutView {
            reference: self.reference,
            step: self.step,
            step_number: self.step.number(),
            total_steps: CheckoutStep::COUNT,
            progress_percent: self.step.progress_percent(),
            status: self.status.clone(),
            errors: self.errors.clone(),
            shipping_method: self.form.shipping_method(),
            payment_method: self.form.payment_method(),
            terms_accepted: self.form.terms_accepted(),
            billing_same_as_shipping: self.form.billing_same_as_shipping(),
            card_fields_visible: self.form.card_fields_visible(),
            can_retreat: !self.is_submitted() && self.step.previous().is_some(),
            can_advance: self.can_advance(cart),
            summary: CartSummary {
                items: cart.snapshot(),
                item_count: cart.item_count(),
                totals: self.totals(cart).rounded(),
            },
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_open(&self) -> CheckoutResult<()> {
        if self.is_submitted() {
            return Err(CheckoutError::AlreadySubmitted);
        }
        Ok(())
    }

    /// Fields the validator of `step` checks, given the current selections.
    fn step_fields(&self, step: CheckoutStep) -> Vec<Field> {
        match step {
            CheckoutStep::CustomerInfo => {
                vec![Field::Email, Field::Phone, Field::FirstName, Field::LastName]
            }
            CheckoutStep::Shipping => {
                let mut fields = Field::SHIPPING_ADDRESS.to_vec();
                fields.push(Field::ShippingMethod);
                if !self.form.billing_same_as_shipping() {
                    fields.extend(Field::BILLING_ADDRESS);
                }
                fields
            }
            CheckoutStep::Payment => {
                let mut fields = vec![Field::PaymentMethod];
                if self.form.card_fields_visible() {
                    fields.extend(Field::CARD);
                }
                fields
            }
        }
    }

    /// Runs the validator of `step` against the draft. Pure.
    pub fn validate_step_on(&self, step: CheckoutStep, today: NaiveDate) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for field in self.step_fields(step) {
            if let Err(e) = self.rules.check_field(field, &self.form, today) {
                errors.record(field, &e);
            }
        }
        errors
    }

    /// Terms accepted and a committed shipping method.
    fn cross_step_errors(&self, today: NaiveDate) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Err(e) = self.rules.check_field(Field::AcceptTerms, &self.form, today) {
            errors.record(Field::AcceptTerms, &e);
        }
        if self.committed.shipping.is_none() {
            errors.record(
                Field::ShippingMethod,
                &ValidationError::required(Field::ShippingMethod.label()),
            );
        }
        errors
    }

    /// Validates `step`, replacing its entries in the error map.
    fn gate(&mut self, step: CheckoutStep, today: NaiveDate) -> CheckoutResult<()> {
        let errors = self.validate_step_on(step, today);
        self.errors.clear_step(step);
        if errors.is_empty() {
            return Ok(());
        }

        debug!(reference = %self.reference, %step, invalid = errors.len(), "Checkout step rejected");
        self.errors.merge(errors.clone());
        Err(CheckoutError::StepRejected { step, errors })
    }

    /// Final validation plus payload assembly. Only the error map changes,
    /// and only on failure.
    fn prepare(
        &mut self,
        cart: &CartStore,
        today: NaiveDate,
    ) -> CheckoutResult<(OrderPayload, PaymentInfo)> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let step = CheckoutStep::LAST;
        let mut errors = self.validate_step_on(step, today);
        errors.merge(self.cross_step_errors(today));
        if !errors.is_empty() {
            debug!(reference = %self.reference, invalid = errors.len(), "Order not ready");
            self.errors.clear_step(step);
            self.errors.merge(errors.clone());
            return Err(CheckoutError::StepRejected { step, errors });
        }

        let customer = self.committed_or_reject(CheckoutStep::CustomerInfo, today, |c| c.customer.clone())?;
        let shipping = self.committed_or_reject(CheckoutStep::Shipping, today, |c| c.shipping.clone())?;
        let billing = self.committed_or_reject(CheckoutStep::Shipping, today, |c| c.billing.clone())?;
        let payment = self.payment_from_form().ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.record(
                Field::PaymentMethod,
                &ValidationError::required(Field::PaymentMethod.label()),
            );
            CheckoutError::StepRejected { step, errors }
        })?;

        let totals = cart.totals(Some(shipping.method));
        let payload = OrderPayload::assemble(
            self.reference,
            customer,
            shipping,
            billing,
            payment.clone(),
            self.form.terms_accepted(),
            cart.snapshot(),
            totals,
        );
        Ok((payload, payment))
    }

    fn committed_or_reject<T>(
        &self,
        step: CheckoutStep,
        today: NaiveDate,
        pick: impl FnOnce(&Committed) -> Option<T>,
    ) -> CheckoutResult<T> {
        pick(&self.committed).ok_or_else(|| CheckoutError::StepRejected {
            step,
            errors: self.validate_step_on(step, today),
        })
    }

    /// Copies the validated draft of `step` into the committed snapshot.
    fn commit(&mut self, step: CheckoutStep) {
        let form = &self.form;
        match step {
            CheckoutStep::CustomerInfo => {
                self.committed.customer = Some(CustomerInfo {
                    email: form.text(Field::Email).to_string(),
                    phone: form.text(Field::Phone).to_string(),
                    first_name: form.text(Field::FirstName).to_string(),
                    last_name: form.text(Field::LastName).to_string(),
                });
            }
            CheckoutStep::Shipping => {
                let address = address_from(form, Field::SHIPPING_ADDRESS);
                let billing = if form.billing_same_as_shipping() {
                    address.clone()
                } else {
                    address_from(form, Field::BILLING_ADDRESS)
                };
                self.committed.shipping = Some(ShippingInfo {
                    address,
                    method: form.shipping_method().unwrap_or_default(),
                });
                self.committed.billing = Some(billing);
            }
            CheckoutStep::Payment => {
                self.committed.payment = self.payment_from_form();
            }
        }
    }

    fn payment_from_form(&self) -> Option<PaymentInfo> {
        let method = self.form.payment_method()?;
        Some(if method.requires_card_details() {
            PaymentInfo::card(self.form.text(Field::CardNumber), self.form.text(Field::CardName))
        } else {
            PaymentInfo::without_card(method)
        })
    }
}

fn address_from(form: &CheckoutForm, fields: [Field; 4]) -> Address {
    let [address, city, postal_code, country] = fields;
    Address {
        address: form.text(address).to_string(),
        city: form.text(city).to_string(),
        postal_code: form.text(postal_code).to_string(),
        country: form.text(country).to_ascii_uppercase(),
    }
}

// =============================================================================
// Checkout View
// =============================================================================

/// Serializable snapshot of the session for the checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    #[ts(as = "String")]
    pub reference: Uuid,
    pub step: CheckoutStep,
    pub step_number: u8,
    pub total_steps: u8,
    pub progress_percent: u8,
    pub status: CheckoutStatus,
    pub errors: ValidationErrors,
    pub shipping_method: Option<ShippingMethod>,
    pub payment_method: Option<PaymentMethod>,
    pub terms_accepted: bool,
    pub billing_same_as_shipping: bool,
    pub card_fields_visible: bool,
    pub can_retreat: bool,
    pub can_advance: bool,
    /// Lines and totals for the selected shipping method, rounded.
    pub summary: CartSummary,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmissionError;
    use crate::money::Money;
    use crate::totals::Pricing;
    use crate::types::NewLineItem;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn cart_with_shirt() -> CartStore {
        let mut cart = CartStore::in_memory(Pricing::default());
        cart.add_item(
            NewLineItem::new("1", "Camisa Lino", Money::from_cents(4990), "/img/1.jpg")
                .with_quantity(2),
        )
        .unwrap();
        cart
    }

    fn fill_customer(session: &mut CheckoutSession) {
        session.set_field(Field::Email, "ana@correo.es").unwrap();
        session.set_field(Field::Phone, "+34 612 345 678").unwrap();
        session.set_field(Field::FirstName, "Ana").unwrap();
        session.set_field(Field::LastName, "Pérez").unwrap();
    }

    fn fill_shipping(session: &mut CheckoutSession, cart: &CartStore) {
        session.set_field(Field::ShippingAddress, "Gran Vía 1").unwrap();
        session.set_field(Field::ShippingCity, "Madrid").unwrap();
        session.set_field(Field::ShippingPostalCode, "28013").unwrap();
        session.set_field(Field::ShippingCountry, "es").unwrap();
        session
            .select_shipping_method(ShippingMethod::Express, cart)
            .unwrap();
    }

    fn fill_card(session: &mut CheckoutSession) {
        session.select_payment_method(PaymentMethod::Card).unwrap();
        session.set_field(Field::CardNumber, "4111 1111 1111 1111").unwrap();
        session.set_field(Field::CardExpiry, "12/99").unwrap();
        session.set_field(Field::CardCvc, "123").unwrap();
        session.set_field(Field::CardName, "Ana Pérez").unwrap();
        session.set_terms_accepted(true).unwrap();
    }

    fn at_payment(cart: &CartStore) -> CheckoutSession {
        let mut session = CheckoutSession::begin(cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);
        session.advance_on(cart, date()).unwrap();
        fill_shipping(&mut session, cart);
        session.advance_on(cart, date()).unwrap();
        fill_card(&mut session);
        session
    }

    struct Accepting;

    #[async_trait]
    impl OrderSubmitter for Accepting {
        async fn submit(&self, order: OrderPayload) -> Result<OrderConfirmation, SubmissionError> {
            Ok(OrderConfirmation {
                order_number: format!("VOURNE-TEST-{}", order.items().len()),
                message: None,
            })
        }
    }

    struct Declining;

    #[async_trait]
    impl OrderSubmitter for Declining {
        async fn submit(&self, _order: OrderPayload) -> Result<OrderConfirmation, SubmissionError> {
            Err(SubmissionError::PaymentDeclined("insufficient funds".into()))
        }
    }

    struct Recording(Mutex<Vec<OrderPayload>>);

    #[async_trait]
    impl OrderSubmitter for Recording {
        async fn submit(&self, order: OrderPayload) -> Result<OrderConfirmation, SubmissionError> {
            self.0.lock().unwrap().push(order);
            Ok(OrderConfirmation {
                order_number: "VOURNE-20260315-0001".into(),
                message: Some("Pedido realizado".into()),
            })
        }
    }

    struct Directory(&'static str);

    #[async_trait]
    impl EmailAvailability for Directory {
        async fn is_email_available(&self, email: &str) -> Result<bool, SubmissionError> {
            Ok(email != self.0)
        }
    }

    struct Offline;

    #[async_trait]
    impl EmailAvailability for Offline {
        async fn is_email_available(&self, _email: &str) -> Result<bool, SubmissionError> {
            Err(SubmissionError::Transient("connection refused".into()))
        }
    }

    #[test]
    fn test_begin_requires_items() {
        let cart = CartStore::in_memory(Pricing::default());
        let err = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[test]
    fn test_empty_email_keeps_step_one() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);
        session.set_field(Field::Email, "").unwrap();

        let err = session.advance_on(&cart, date()).unwrap_err();
        assert!(matches!(err, CheckoutError::StepRejected { step: CheckoutStep::CustomerInfo, .. }));
        assert_eq!(session.step(), CheckoutStep::CustomerInfo);
        assert_eq!(session.errors().get(Field::Email), Some("Email is required"));
        assert!(session.customer().is_none());
    }

    #[test]
    fn test_advance_commits_and_clears_errors() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        assert!(session.advance_on(&cart, date()).is_err());
        assert_eq!(session.errors().len(), 4);

        fill_customer(&mut session);
        let moved = session.advance_on(&cart, date()).unwrap();
        assert!(matches!(moved, Advance::Moved(CheckoutStep::Shipping)));
        assert!(session.errors().is_empty());
        assert_eq!(session.customer().unwrap().full_name(), "Ana Pérez");
    }

    #[test]
    fn test_editing_a_field_clears_its_error() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        let _ = session.advance_on(&cart, date());
        assert!(session.errors().contains(Field::Phone));
        session.set_field(Field::Phone, "6").unwrap();
        assert!(!session.errors().contains(Field::Phone));
        assert!(session.errors().contains(Field::Email));
    }

    #[test]
    fn test_validate_field_touches_only_its_entry() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        session.set_field(Field::Email, "ana@").unwrap();
        assert!(session.validate_field_on(Field::Email, date()).is_err());
        assert_eq!(session.errors().len(), 1);

        session.set_field(Field::Email, "ana@correo.es").unwrap();
        assert!(session.validate_field_on(Field::Email, date()).is_ok());
        assert!(session.errors().is_empty());
        assert_eq!(session.step(), CheckoutStep::CustomerInfo);
    }

    #[test]
    fn test_shipping_step_requires_method_and_supported_country() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);
        session.advance_on(&cart, date()).unwrap();

        session.set_field(Field::ShippingAddress, "5th Avenue 1").unwrap();
        session.set_field(Field::ShippingCity, "New York").unwrap();
        session.set_field(Field::ShippingPostalCode, "10001").unwrap();
        session.set_field(Field::ShippingCountry, "US").unwrap();

        let err = session.advance_on(&cart, date()).unwrap_err();
        let CheckoutError::StepRejected { errors, .. } = err else {
            panic!("expected rejection");
        };
        assert!(errors.contains(Field::ShippingCountry));
        assert!(errors.contains(Field::ShippingMethod));
        assert_eq!(session.step(), CheckoutStep::Shipping);
    }

    #[test]
    fn test_shipping_method_recomputes_totals_without_moving() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        let standard = session.totals(&cart);
        let express = session
            .select_shipping_method(ShippingMethod::Express, &cart)
            .unwrap();
        assert_eq!(standard.shipping, Money::from_cents(495));
        assert_eq!(express.shipping, Money::from_cents(995));
        assert_eq!(session.step(), CheckoutStep::CustomerInfo);
    }

    #[test]
    fn test_hidden_billing_fields_refuse_edits() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        let err = session.set_field(Field::BillingCity, "Sevilla").unwrap_err();
        assert!(matches!(err, CheckoutError::FieldHidden(Field::BillingCity)));

        session.set_billing_same_as_shipping(false).unwrap();
        session.set_field(Field::BillingCity, "Sevilla").unwrap();
        assert_eq!(session.form().text(Field::BillingCity), "Sevilla");
    }

    #[test]
    fn test_separate_billing_is_validated_and_committed() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);
        session.advance_on(&cart, date()).unwrap();
        fill_shipping(&mut session, &cart);
        session.set_billing_same_as_shipping(false).unwrap();

        let err = session.advance_on(&cart, date()).unwrap_err();
        assert!(matches!(err, CheckoutError::StepRejected { .. }));
        assert!(session.errors().contains(Field::BillingAddress));
        assert!(!session.errors().contains(Field::ShippingAddress));

        session.set_field(Field::BillingAddress, "Calle Sierpes 4").unwrap();
        session.set_field(Field::BillingCity, "Sevilla").unwrap();
        session.set_field(Field::BillingPostalCode, "41004").unwrap();
        session.set_field(Field::BillingCountry, "ES").unwrap();
        session.advance_on(&cart, date()).unwrap();
        assert_eq!(session.billing().unwrap().address, "Calle Sierpes 4");
        assert_eq!(session.shipping().unwrap().address.address, "Gran Vía 1");
    }

    #[test]
    fn test_mirrored_billing_commits_shipping_address() {
        let cart = cart_with_shirt();
        let mut session = at_payment(&cart);
        let shipping = session.shipping().unwrap().address.clone();
        assert_eq!(session.billing(), Some(&shipping));
        assert_eq!(shipping.country, "ES");
        assert!(session.retreat().is_ok());
    }

    #[test]
    fn test_mirrored_billing_follows_later_shipping_edits() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);
        session.advance_on(&cart, date()).unwrap();
        fill_shipping(&mut session, &cart);
        session.set_billing_same_as_shipping(false).unwrap();
        session.set_billing_same_as_shipping(true).unwrap();
        assert_eq!(session.form().text(Field::BillingCity), "Madrid");

        session.set_field(Field::ShippingCity, "Alcobendas").unwrap();
        session.set_field(Field::ShippingPostalCode, "28100").unwrap();
        session.advance_on(&cart, date()).unwrap();

        let billing = session.billing().unwrap();
        assert_eq!(billing, &session.shipping().unwrap().address);
        assert_eq!(billing.city, "Alcobendas");
        assert_eq!(session.form().text(Field::BillingCity), "Madrid");
    }

    #[test]
    fn test_retreat_keeps_data_and_stops_at_first_step() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        assert!(matches!(session.retreat(), Err(CheckoutError::AtFirstStep)));

        fill_customer(&mut session);
        session.advance_on(&cart, date()).unwrap();
        assert_eq!(session.retreat().unwrap(), CheckoutStep::CustomerInfo);
        assert_eq!(session.form().text(Field::Email), "ana@correo.es");
        assert!(session.customer().is_some());
    }

    #[test]
    fn test_re_advance_revalidates() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);
        session.advance_on(&cart, date()).unwrap();
        session.retreat().unwrap();
        session.set_field(Field::Email, "broken").unwrap();
        assert!(session.advance_on(&cart, date()).is_err());
        assert_eq!(session.step(), CheckoutStep::CustomerInfo);
        // the last good data stays committed
        assert_eq!(session.customer().unwrap().email, "ana@correo.es");
    }

    #[test]
    fn test_card_checks_on_payment_step() {
        let cart = cart_with_shirt();
        let mut session = at_payment(&cart);
        session.set_field(Field::CardNumber, "4111 1111 1111 1112").unwrap();
        session.set_field(Field::CardExpiry, "01/26").unwrap();
        session.set_field(Field::CardCvc, "12").unwrap();

        let err = session.advance_on(&cart, date()).unwrap_err();
        let CheckoutError::StepRejected { step, errors } = err else {
            panic!("expected rejection");
        };
        assert_eq!(step, CheckoutStep::Payment);
        assert!(errors.contains(Field::CardNumber));
        assert!(errors.contains(Field::CardExpiry));
        assert!(errors.contains(Field::CardCvc));
        assert!(!errors.contains(Field::CardName));
    }

    #[test]
    fn test_paypal_skips_card_fields() {
        let cart = cart_with_shirt();
        let mut session = at_payment(&cart);
        session.set_field(Field::CardNumber, "").unwrap();
        session.select_payment_method(PaymentMethod::PayPal).unwrap();
        let advance = session.advance_on(&cart, date()).unwrap();
        let Advance::Ready(payload) = advance else {
            panic!("expected payload");
        };
        assert_eq!(payload.payment().method, PaymentMethod::PayPal);
        assert!(payload.payment().card_last_four.is_none());
    }

    #[test]
    fn test_final_advance_requires_terms() {
        let cart = cart_with_shirt();
        let mut session = at_payment(&cart);
        session.set_terms_accepted(false).unwrap();
        let err = session.advance_on(&cart, date()).unwrap_err();
        assert!(matches!(err, CheckoutError::StepRejected { .. }));
        assert_eq!(
            session.errors().get(Field::AcceptTerms),
            Some("Terms and conditions must be accepted")
        );
    }

    #[test]
    fn test_payload_uses_committed_data_and_selected_method() {
        let cart = cart_with_shirt();
        let mut session = at_payment(&cart);
        let Advance::Ready(payload) = session.advance_on(&cart, date()).unwrap() else {
            panic!("expected payload");
        };
        assert_eq!(payload.reference(), session.reference());
        assert_eq!(payload.customer().email, "ana@correo.es");
        assert_eq!(payload.shipping().method, ShippingMethod::Express);
        assert_eq!(payload.payment().card_last_four.as_deref(), Some("1111"));
        assert!(payload.terms_accepted());
        assert_eq!(payload.items().len(), 1);
        // 99.80 subtotal, below the threshold
        assert_eq!(payload.totals().shipping, Money::from_cents(995));
        assert_eq!(payload.totals().tax, Money::from_cents(2096));
        assert_eq!(payload.totals().total, Money::from_cents(9980 + 2096 + 995));
    }

    #[test]
    fn test_method_changed_on_payment_step_reaches_payload() {
        let cart = cart_with_shirt();
        let mut session = at_payment(&cart);
        assert_eq!(session.step(), CheckoutStep::Payment);

        let shown = session
            .select_shipping_method(ShippingMethod::Standard, &cart)
            .unwrap();
        assert_eq!(session.shipping().unwrap().method, ShippingMethod::Standard);

        let Advance::Ready(payload) = session.advance_on(&cart, date()).unwrap() else {
            panic!("expected payload");
        };
        assert_eq!(payload.shipping().method, ShippingMethod::Standard);
        assert_eq!(payload.totals(), &shown);
        assert_eq!(payload.totals().shipping, Money::from_cents(495));
    }

    #[test]
    fn test_view_reflects_session() {
        let cart = cart_with_shirt();
        let session = at_payment(&cart);
        let view = session.view(&cart);
        assert_eq!(view.step_number, 3);
        assert_eq!(view.progress_percent, 100);
        assert!(view.can_retreat);
        assert!(view.can_advance);
        assert!(view.card_fields_visible);
        assert_eq!(view.summary.totals.shipping, Money::from_cents(995));
    }

    #[tokio::test]
    async fn test_submit_success_clears_cart_and_locks_session() {
        let mut cart = cart_with_shirt();
        let mut session = at_payment(&cart);

        let confirmation = session.submit(&mut cart, &Accepting).await.unwrap();
        assert_eq!(confirmation.order_number, "VOURNE-TEST-1");
        assert!(cart.is_empty());
        assert!(session.is_submitted());
        assert!(matches!(session.retreat(), Err(CheckoutError::AlreadySubmitted)));
        assert!(matches!(
            session.submit(&mut cart, &Accepting).await,
            Err(CheckoutError::AlreadySubmitted)
        ));
    }

    #[tokio::test]
    async fn test_submit_failure_changes_nothing() {
        let mut cart = cart_with_shirt();
        let mut session = at_payment(&cart);

        let err = session.submit(&mut cart, &Declining).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Submission(SubmissionError::PaymentDeclined(_))));
        assert_eq!(session.step(), CheckoutStep::Payment);
        assert_eq!(session.status(), &CheckoutStatus::InProgress);
        assert!(session.payment().is_none());
        assert_eq!(cart.item_count(), 2);

        // retry with a working backend reuses the same reference
        let recorder = Recording(Mutex::new(Vec::new()));
        session.submit(&mut cart, &recorder).await.unwrap();
        let sent = recorder.0.lock().unwrap();
        assert_eq!(sent[0].reference(), session.reference());
    }

    #[tokio::test]
    async fn test_submit_until_cancelled_changes_nothing() {
        let mut cart = cart_with_shirt();
        let mut session = at_payment(&cart);

        let err = session
            .submit_until(&mut cart, &Accepting, async {})
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Cancelled));
        assert!(!session.is_submitted());
        assert_eq!(session.step(), CheckoutStep::Payment);
        assert_eq!(cart.item_count(), 2);
    }

    #[tokio::test]
    async fn test_submit_from_earlier_step_is_refused() {
        let mut cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        let err = session.submit(&mut cart, &Accepting).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotAtFinalStep { step: CheckoutStep::CustomerInfo }));
    }

    #[tokio::test]
    async fn test_submit_rechecks_cart() {
        let mut cart = cart_with_shirt();
        let mut session = at_payment(&cart);
        cart.clear();
        let err = session.submit(&mut cart, &Accepting).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_advance_verified_rejects_taken_email() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);

        let err = session
            .advance_verified(&cart, &Directory("ana@correo.es"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::StepRejected { .. }));
        assert_eq!(session.step(), CheckoutStep::CustomerInfo);
        assert!(session.errors().get(Field::Email).unwrap().contains("already exists"));

        session.set_field(Field::Email, "otra@correo.es").unwrap();
        let moved = session
            .advance_verified(&cart, &Directory("ana@correo.es"))
            .await
            .unwrap();
        assert!(matches!(moved, Advance::Moved(CheckoutStep::Shipping)));
    }

    #[tokio::test]
    async fn test_advance_verified_failing_check_refuses() {
        let cart = cart_with_shirt();
        let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();
        fill_customer(&mut session);
        let err = session.advance_verified(&cart, &Offline).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Submission(SubmissionError::Transient(_))));
        assert_eq!(session.step(), CheckoutStep::CustomerInfo);
        assert!(session.customer().is_none());
    }
}
