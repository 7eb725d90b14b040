//! # State Module
//!
//! Everything a storefront page session holds between commands.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Storefront State                                     │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────────────┐   │
//! │  │  CartStore   │  │ Option<Checkout  │  │  Collaborators           │   │
//! │  │              │  │    Session>      │  │                          │   │
//! │  │  lines +     │  │  at most one at  │  │  Arc<dyn OrderSubmitter> │   │
//! │  │  storage     │  │  a time          │  │  Arc<dyn EmailAvail..>?  │   │
//! │  └──────┬───────┘  └──────────────────┘  └──────────────────────────┘   │
//! │         │ subscribe                                                     │
//! │         ▼                                                               │
//! │  changes: Arc<Mutex<Vec<CartChange>>> ──► drained into each reply       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commands run one at a time, so the state is owned by the command loop
//! and handed to each handler as `&mut Storefront`.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use vourne_core::{
    CartChange, CartStore, CheckoutRules, CheckoutSession, EmailAvailability, MemoryStorage,
    OrderSubmitter,
};
use vourne_storage::FileStorage;

use crate::config::{ConfigError, ConfigResult, StorefrontConfig};
use crate::error::{ApiError, AppResult};
use crate::http::{HttpEmailAvailability, HttpOrderSubmitter};

/// The cart, the current checkout and the backends they talk to.
pub struct Storefront {
    cart: CartStore,
    checkout: Option<CheckoutSession>,
    rules: CheckoutRules,
    submitter: Arc<dyn OrderSubmitter>,
    email_check: Option<Arc<dyn EmailAvailability>>,
    changes: Arc<Mutex<Vec<CartChange>>>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("cart", &self.cart)
            .field("checkout", &self.checkout.as_ref().map(|s| s.reference()))
            .field("email_check", &self.email_check.is_some())
            .finish()
    }
}

impl Storefront {
    /// Wires the state together and subscribes to cart changes.
    pub fn new(
        mut cart: CartStore,
        rules: CheckoutRules,
        submitter: Arc<dyn OrderSubmitter>,
        email_check: Option<Arc<dyn EmailAvailability>>,
    ) -> Self {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        cart.subscribe(move |change: &CartChange| {
            if let Ok(mut pending) = sink.lock() {
                pending.push(*change);
            }
        });

        Storefront {
            cart,
            checkout: None,
            rules,
            submitter,
            email_check,
            changes,
        }
    }

    /// Builds the production state: file-backed cart and HTTP backends.
    ///
    /// A cart directory that cannot be opened is not fatal: the cart runs
    /// in memory and says so in every cart response.
    pub fn from_config(config: &StorefrontConfig) -> ConfigResult<Self> {
        let rules = config.rules()?;
        let pricing = config.pricing();

        let cart = match FileStorage::open(&config.storage) {
            Ok(storage) => CartStore::open(storage, pricing),
            Err(e) => {
                warn!(error = %e, "Cart directory unavailable, keeping the cart in memory");
                CartStore::open(MemoryStorage::new(), pricing)
            }
        };

        let submitter = HttpOrderSubmitter::new(&config.api)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let email_check: Option<Arc<dyn EmailAvailability>> =
            match &config.api.email_check_endpoint {
                Some(endpoint) => Some(Arc::new(
                    HttpEmailAvailability::new(&config.api, endpoint.clone())
                        .map_err(|e| ConfigError::Invalid(e.to_string()))?,
                )),
                None => None,
            };

        info!(
            store = %config.store.name,
            order_endpoint = %config.api.order_endpoint,
            email_check = email_check.is_some(),
            lines = cart.line_count(),
            "Storefront ready"
        );

        Ok(Storefront::new(cart, rules, Arc::new(submitter), email_check))
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut CartStore {
        &mut self.cart
    }

    pub fn rules(&self) -> &CheckoutRules {
        &self.rules
    }

    pub fn submitter(&self) -> Arc<dyn OrderSubmitter> {
        Arc::clone(&self.submitter)
    }

    pub fn email_check(&self) -> Option<Arc<dyn EmailAvailability>> {
        self.email_check.clone()
    }

    pub fn checkout(&self) -> Option<&CheckoutSession> {
        self.checkout.as_ref()
    }

    /// Replaces any previous session.
    pub fn set_checkout(&mut self, session: CheckoutSession) {
        if let Some(old) = self.checkout.replace(session) {
            info!(reference = %old.reference(), "Previous checkout abandoned");
        }
    }

    pub fn take_checkout(&mut self) -> Option<CheckoutSession> {
        self.checkout.take()
    }

    /// The session together with the cart it reads from.
    pub fn checkout_parts(&mut self) -> AppResult<(&mut CheckoutSession, &mut CartStore)> {
        match self.checkout.as_mut() {
            Some(session) => Ok((session, &mut self.cart)),
            None => Err(ApiError::no_checkout()),
        }
    }

    /// Cart changes since the last call, oldest first.
    pub fn drain_changes(&self) -> Vec<CartChange> {
        match self.changes.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => Vec::new(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use vourne_core::{Money, NewLineItem};

    #[test]
    fn test_changes_are_collected_and_drained() {
        let mut store = storefront(Arc::new(AcceptingBackend::default()));
        store
            .cart_mut()
            .add_item(NewLineItem::new("7", "Vestido Seda", Money::from_cents(8900), "/img/7.jpg"))
            .unwrap();
        store.cart_mut().clear();

        let changes = store.drain_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].item_count, 1);
        assert_eq!(changes[1].item_count, 0);
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn test_checkout_parts_requires_session() {
        let mut store = storefront(Arc::new(AcceptingBackend::default()));
        let err = store.checkout_parts().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NoCheckout);
    }

    #[test]
    fn test_from_config_falls_back_when_dir_is_unusable() {
        let blocker = std::env::temp_dir().join(format!("vourne-blocker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = StorefrontConfig::default();
        config.storage = vourne_storage::StorageConfig::at(blocker.join("cart"));
        let store = Storefront::from_config(&config).unwrap();
        assert!(store.cart().is_empty());
        assert!(store.email_check().is_none());

        let _ = std::fs::remove_file(&blocker);
    }
}
