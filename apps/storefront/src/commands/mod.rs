//! # Commands Module
//!
//! The storefront page drives the engine with one JSON command per line.
//!
//! ## Command Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Storefront Commands                                  │
//! │                                                                         │
//! │  ┌─────────────────────┐  ┌─────────────────────┐                       │
//! │  │  Cart (cart.rs)     │  │ Checkout            │                       │
//! │  │                     │  │ (checkout.rs)       │                       │
//! │  │  • get_cart         │  │  • begin_checkout   │                       │
//! │  │  • add_to_cart      │  │  • get_checkout     │                       │
//! │  │  • update_cart_item │  │  • set_field        │                       │
//! │  │  • remove_from_cart │  │  • blur_field       │                       │
//! │  │  • clear_cart       │  │  • select_*_method  │                       │
//! │  │                     │  │  • accept_terms     │                       │
//! │  │                     │  │  • next_step        │                       │
//! │  │                     │  │  • previous_step    │                       │
//! │  │                     │  │  • submit_order     │                       │
//! │  │                     │  │  • abandon_checkout │                       │
//! │  └─────────────────────┘  └─────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shape
//! ```text
//! → {"command":"add_to_cart","item":{"id":"1","name":"Camisa Lino","price":"49.90","image":"/img/1.jpg"}}
//! ← {"ok":true,"data":{"type":"cart","data":{...}},"events":[{"itemCount":1,...}]}
//!
//! → {"command":"next_step"}
//! ← {"ok":false,"error":{"code":"STEP_REJECTED","message":"...","fields":{...}}}
//! ```

pub mod cart;
pub mod checkout;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vourne_core::{CartChange, CheckoutView, NewLineItem};

use crate::error::{ApiError, AppResult};
use crate::state::Storefront;

pub use cart::CartResponse;
pub use checkout::OrderResponse;

/// One request from the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    GetCart,
    AddToCart {
        item: NewLineItem,
    },
    UpdateCartItem {
        id: String,
        #[serde(default)]
        size: Option<String>,
        #[serde(default)]
        color: Option<String>,
        quantity: i64,
    },
    RemoveFromCart {
        id: String,
        #[serde(default)]
        size: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },
    ClearCart,
    BeginCheckout,
    GetCheckout,
    SetField {
        field: String,
        value: String,
    },
    BlurField {
        field: String,
    },
    SelectShippingMethod {
        method: String,
    },
    SelectPaymentMethod {
        method: String,
    },
    SetBillingSameAsShipping {
        same: bool,
    },
    AcceptTerms {
        accepted: bool,
    },
    NextStep,
    PreviousStep,
    SubmitOrder,
    AbandonCheckout,
}

impl Command {
    /// Parses one input line.
    pub fn parse(line: &str) -> AppResult<Command> {
        serde_json::from_str(line).map_err(|e| ApiError::invalid_command(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::GetCart => "get_cart",
            Command::AddToCart { .. } => "add_to_cart",
            Command::UpdateCartItem { .. } => "update_cart_item",
            Command::RemoveFromCart { .. } => "remove_from_cart",
            Command::ClearCart => "clear_cart",
            Command::BeginCheckout => "begin_checkout",
            Command::GetCheckout => "get_checkout",
            Command::SetField { .. } => "set_field",
            Command::BlurField { .. } => "blur_field",
            Command::SelectShippingMethod { .. } => "select_shipping_method",
            Command::SelectPaymentMethod { .. } => "select_payment_method",
            Command::SetBillingSameAsShipping { .. } => "set_billing_same_as_shipping",
            Command::AcceptTerms { .. } => "accept_terms",
            Command::NextStep => "next_step",
            Command::PreviousStep => "previous_step",
            Command::SubmitOrder => "submit_order",
            Command::AbandonCheckout => "abandon_checkout",
        }
    }
}

/// Successful command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Cart(CartResponse),
    Checkout(Box<CheckoutView>),
    Order(OrderResponse),
    CheckoutAbandoned,
}

/// One line written back to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Response>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,

    /// Cart change notifications raised while the command ran.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<CartChange>,
}

impl Reply {
    pub fn from_result(result: AppResult<Response>, events: Vec<CartChange>) -> Reply {
        match result {
            Ok(data) => Reply {
                ok: true,
                data: Some(data),
                error: None,
                events,
            },
            Err(error) => Reply {
                ok: false,
                data: None,
                error: Some(error),
                events,
            },
        }
    }

    pub fn error(error: ApiError) -> Reply {
        Reply::from_result(Err(error), Vec::new())
    }
}

/// Runs one command. An order submission in flight is never cancelled.
pub async fn dispatch(store: &mut Storefront, command: Command) -> Reply {
    dispatch_until(store, command, std::future::pending::<()>()).await
}

/// Runs one command; an order submission is abandoned once `cancel`
/// completes.
pub async fn dispatch_until<C>(store: &mut Storefront, command: Command, cancel: C) -> Reply
where
    C: Future<Output = ()>,
{
    let name = command.name();
    debug!(command = name, "Dispatching command");

    let result = match command {
        Command::GetCart => Ok(Response::Cart(cart::get_cart(store))),
        Command::AddToCart { item } => cart::add_to_cart(store, item).map(Response::Cart),
        Command::UpdateCartItem {
            id,
            size,
            color,
            quantity,
        } => cart::update_cart_item(store, id, size, color, quantity).map(Response::Cart),
        Command::RemoveFromCart { id, size, color } => {
            Ok(Response::Cart(cart::remove_from_cart(store, id, size, color)))
        }
        Command::ClearCart => Ok(Response::Cart(cart::clear_cart(store))),
        Command::BeginCheckout => checkout::begin_checkout(store).map(checkout_response),
        Command::GetCheckout => checkout::get_checkout(store).map(checkout_response),
        Command::SetField { field, value } => {
            checkout::set_field(store, &field, value).map(checkout_response)
        }
        Command::BlurField { field } => checkout::blur_field(store, &field).map(checkout_response),
        Command::SelectShippingMethod { method } => {
            checkout::select_shipping_method(store, &method).map(checkout_response)
        }
        Command::SelectPaymentMethod { method } => {
            checkout::select_payment_method(store, &method).map(checkout_response)
        }
        Command::SetBillingSameAsShipping { same } => {
            checkout::set_billing_same_as_shipping(store, same).map(checkout_response)
        }
        Command::AcceptTerms { accepted } => {
            checkout::accept_terms(store, accepted).map(checkout_response)
        }
        Command::NextStep => checkout::next_step(store, cancel).await,
        Command::PreviousStep => checkout::previous_step(store).map(checkout_response),
        Command::SubmitOrder => checkout::submit_order(store, cancel)
            .await
            .map(Response::Order),
        Command::AbandonCheckout => {
            checkout::abandon_checkout(store);
            Ok(Response::CheckoutAbandoned)
        }
    };

    if let Err(ref e) = result {
        debug!(command = name, code = ?e.code, "Command failed");
    }
    Reply::from_result(result, store.drain_changes())
}

fn checkout_response(view: CheckoutView) -> Response {
    Response::Checkout(Box::new(view))
}

// =============================================================================
// Unit Tests
// =============================================================================
