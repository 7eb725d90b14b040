//! # Checkout Commands
//!
//! Commands for the three-step checkout page.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Checkout Flow                                  │
//! │                                                                         │
//! │  begin_checkout                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐ next_step ┌──────────────┐ next_step ┌─────────────┐  │
//! │  │ 1. Customer  │──────────►│ 2. Shipping  │──────────►│ 3. Payment  │  │
//! │  │    info      │◄──────────│              │◄──────────│             │  │
//! │  └──────────────┘ previous  └──────────────┘ previous  └──────┬──────┘  │
//! │                                                               │         │
//! │                                      next_step / submit_order │         │
//! │                                                               ▼         │
//! │                                          ┌──────────────────────────┐   │
//! │                                          │ OrderSubmitter (HTTP)    │   │
//! │                                          │  ok → Submitted, cart [] │   │
//! │                                          │  err → stay on payment   │   │
//! │                                          └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vourne_core::{
    Advance, CheckoutSession, CheckoutStep, CheckoutView, Field, PaymentMethod, ShippingMethod,
};

use super::Response;
use crate::error::{ApiError, AppResult};
use crate::state::Storefront;

/// Returned once the backend accepted the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_number: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Final state of the checkout page (status `submitted`).
    pub checkout: Box<CheckoutView>,
}

fn current(store: &Storefront) -> AppResult<&CheckoutSession> {
    store.checkout().ok_or_else(ApiError::no_checkout)
}

/// Starts a checkout, replacing any earlier one.
pub fn begin_checkout(store: &mut Storefront) -> AppResult<CheckoutView> {
    let session = CheckoutSession::begin(store.cart(), store.rules().clone())?;
    let view = session.view(store.cart());
    store.set_checkout(session);
    Ok(view)
}

pub fn get_checkout(store: &Storefront) -> AppResult<CheckoutView> {
    Ok(current(store)?.view(store.cart()))
}

/// Stores a typed value. Validation waits for blur or next_step.
pub fn set_field(store: &mut Storefront, field: &str, value: String) -> AppResult<CheckoutView> {
    let field: Field = field.parse()?;
    let (session, cart) = store.checkout_parts()?;
    session.set_field(field, value)?;
    Ok(session.view(cart))
}

/// Inline validation of one field; the message shows up in `errors`.
pub fn blur_field(store: &mut Storefront, field: &str) -> AppResult<CheckoutView> {
    let field: Field = field.parse()?;
    let (session, cart) = store.checkout_parts()?;
    if let Err(e) = session.validate_field(field) {
        debug!(%field, error = %e, "Field invalid");
    }
    Ok(session.view(cart))
}

/// Picks a shipping method and reprices the summary.
pub fn select_shipping_method(store: &mut Storefront, method: &str) -> AppResult<CheckoutView> {
    let method: ShippingMethod = method.parse()?;
    let (session, cart) = store.checkout_parts()?;
    session.select_shipping_method(method, cart)?;
    Ok(session.view(cart))
}

pub fn select_payment_method(store: &mut Storefront, method: &str) -> AppResult<CheckoutView> {
    let method: PaymentMethod = method.parse()?;
    let (session, cart) = store.checkout_parts()?;
    session.select_payment_method(method)?;
    Ok(session.view(cart))
}

pub fn set_billing_same_as_shipping(store: &mut Storefront, same: bool) -> AppResult<CheckoutView> {
    let (session, cart) = store.checkout_parts()?;
    session.set_billing_same_as_shipping(same)?;
    Ok(session.view(cart))
}

pub fn accept_terms(store: &mut Storefront, accepted: bool) -> AppResult<CheckoutView> {
    let (session, cart) = store.checkout_parts()?;
    session.set_terms_accepted(accepted)?;
    Ok(session.view(cart))
}

/// Validates the current step and moves on.
///
/// Leaving the customer step asks the email check when one is configured.
/// On the payment step this submits the order.
pub async fn next_step<C>(store: &mut Storefront, cancel: C) -> AppResult<Response>
where
    C: Future<Output = ()>,
{
    if current(store)?.step() == CheckoutStep::LAST {
        return submit_order(store, cancel).await.map(Response::Order);
    }

    let email_check = store.email_check();
    let (session, cart) = store.checkout_parts()?;
    let advance = match email_check {
        Some(remote) => session.advance_verified(cart, remote.as_ref()).await?,
        None => session.advance(cart)?,
    };

    if let Advance::Moved(step) = advance {
        debug!(step = %step, "Checkout moved");
    }
    Ok(Response::Checkout(Box::new(session.view(cart))))
}

pub fn previous_step(store: &mut Storefront) -> AppResult<CheckoutView> {
    let (session, cart) = store.checkout_parts()?;
    session.retreat()?;
    Ok(session.view(cart))
}

/// Sends the order. A failure leaves the session on the payment step with
/// every field intact, so the shopper can retry.
pub async fn submit_order<C>(store: &mut Storefront, cancel: C) -> AppResult<OrderResponse>
where
    C: Future<Output = ()>,
{
    let submitter = store.submitter();
    let (session, cart) = store.checkout_parts()?;
    let confirmation = session
        .submit_until(cart, submitter.as_ref(), cancel)
        .await?;

    Ok(OrderResponse {
        order_number: confirmation.order_number,
        message: confirmation.message,
        checkout: Box::new(session.view(cart)),
    })
}

/// Drops the checkout. The cart is untouched.
pub fn abandon_checkout(store: &mut Storefront) {
    if let Some(session) = store.take_checkout() {
        info!(reference = %session.reference(), "Checkout abandoned");
    }
}
