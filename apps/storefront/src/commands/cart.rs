//! # Cart Commands
//!
//! Commands for the cart drawer and the product page.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Lifecycle                                       │
//! │                                                                         │
//! │  ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐        │
//! │  │  Empty   │────►│ In Cart  │────►│ Checkout │────►│  Order   │        │
//! │  │  Cart    │     │          │     │ (3 steps)│     │  placed  │        │
//! │  └──────────┘     └──────────┘     └──────────┘     └──────────┘        │
//! │       ▲                │                                  │             │
//! │       │           add_to_cart                             │             │
//! │       │           update_cart_item                        │             │
//! │       │           remove_from_cart                        │             │
//! │       │                │                                  │             │
//! │       └──── clear_cart ┘◄───────── cart cleared ──────────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is written through to storage before the reply, so a
//! reload of the page sees the same cart.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vourne_core::{ItemKey, LineItem, NewLineItem, Totals};

use crate::error::AppResult;
use crate::state::Storefront;

/// Cart response including lines and rounded totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<LineItem>,

    /// Header badge: sum of quantities.
    pub item_count: u32,

    pub line_count: u32,

    /// With standard shipping (or free, over the threshold).
    pub totals: Totals,

    /// True when the cart could not be saved and lives only in memory.
    pub degraded: bool,
}

impl From<&vourne_core::CartStore> for CartResponse {
    fn from(cart: &vourne_core::CartStore) -> Self {
        CartResponse {
            items: cart.snapshot(),
            item_count: cart.item_count(),
            line_count: cart.line_count() as u32,
            totals: cart.totals(None).rounded(),
            degraded: cart.is_degraded(),
        }
    }
}

/// Gets the current cart contents.
pub fn get_cart(store: &Storefront) -> CartResponse {
    debug!("get_cart command");
    CartResponse::from(store.cart())
}

/// Adds a product, merging with an existing line of the same size and color.
///
/// ## Returns
/// The whole cart, so the drawer re-renders from one source.
pub fn add_to_cart(store: &mut Storefront, item: NewLineItem) -> AppResult<CartResponse> {
    debug!(
        product_id = ?item.product_id,
        size = ?item.size,
        color = ?item.color,
        quantity = ?item.quantity,
        "add_to_cart command"
    );

    let line = store.cart_mut().add_item(item)?;
    debug!(key = %line.key(), quantity = line.quantity, "Line updated");
    Ok(CartResponse::from(store.cart()))
}

/// Sets a line's quantity; zero or less removes it.
pub fn update_cart_item(
    store: &mut Storefront,
    id: String,
    size: Option<String>,
    color: Option<String>,
    quantity: i64,
) -> AppResult<CartResponse> {
    let key = ItemKey::new(id, size.as_deref(), color.as_deref());
    debug!(%key, quantity, "update_cart_item command");

    store.cart_mut().update_quantity(&key, quantity)?;
    Ok(CartResponse::from(store.cart()))
}

/// Removes a line. Unknown lines are ignored.
pub fn remove_from_cart(
    store: &mut Storefront,
    id: String,
    size: Option<String>,
    color: Option<String>,
) -> CartResponse {
    let key = ItemKey::new(id, size.as_deref(), color.as_deref());
    debug!(%key, "remove_from_cart command");

    store.cart_mut().remove_item(&key);
    CartResponse::from(store.cart())
}

pub fn clear_cart(store: &mut Storefront) -> CartResponse {
    debug!("clear_cart command");
    store.cart_mut().clear();
    CartResponse::from(store.cart())
}
