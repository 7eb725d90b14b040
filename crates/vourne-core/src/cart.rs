//! # Cart Store
//!
//! The canonical collection of line items, persisted on every change.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Store Operations                                │
//! │                                                                         │
//! │  Shopper Action           CartStore               Side effects          │
//! │  ──────────────           ─────────               ────────────          │
//! │                                                                         │
//! │  "Añadir al carrito" ───► add_item() ───────┐                           │
//! │  Change quantity ───────► update_quantity() ┤                           │
//! │  Click remove ──────────► remove_item() ────┼──► save("vourneo_cart")   │
//! │  Empty cart ────────────► clear() ──────────┘    notify(CartChange)     │
//! │                                                                         │
//! │  Page load ─────────────► open() ───────────────► load + repair         │
//! │  Render ────────────────► items() / totals() ───► (read only)           │
//! │                                                                         │
//! │  Validation failures change nothing and persist nothing.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persistence Faults
//! Storage errors never reach the caller. A failed load yields an empty
//! cart; a failed save keeps the in-memory change and marks the store
//! degraded until the next successful save.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, PersistenceError, ValidationError};
use crate::money::Money;
use crate::storage::{CartStorage, MemoryStorage, CART_STORAGE_KEY};
use crate::totals::{Pricing, Totals};
use crate::types::{ItemKey, LineItem, NewLineItem, ShippingMethod};
use crate::validation::{
    validate_product_name, validate_quantity, validate_required, validate_unit_price,
};
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

// =============================================================================
// Notifications
// =============================================================================

/// Handle returned by [`CartStore::subscribe`].
pub type SubscriptionId = u64;

/// Delivered to subscribers after every mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartChange {
    /// Sum of quantities (the header badge).
    pub item_count: u32,
    /// Distinct lines.
    pub line_count: u32,
    /// Totals with the default shipping method.
    pub totals: Totals,
}

type Listener = Box<dyn Fn(&CartChange) + Send>;

/// What the checkout page shows next to the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<LineItem>,
    pub item_count: u32,
    pub totals: Totals,
}

// =============================================================================
// Cart Store
// =============================================================================

/// Owns the cart lines and writes them through to [`CartStorage`].
///
/// ## Invariants
/// - No two lines share an [`ItemKey`]
/// - Every quantity is between 1 and MAX_ITEM_QUANTITY
/// - At most MAX_CART_LINES lines
pub struct CartStore {
    items: Vec<LineItem>,
    storage: Box<dyn CartStorage>,
    pricing: Pricing,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    degraded: bool,
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("items", &self.items)
            .field("pricing", &self.pricing)
            .field("listeners", &self.listeners.len())
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl CartStore {
    /// Opens the cart persisted in `storage`.
    ///
    /// Missing, unreadable or corrupt data yields an empty cart.
    pub fn open(storage: impl CartStorage + 'static, pricing: Pricing) -> Self {
        let (items, degraded) = match storage.load(CART_STORAGE_KEY) {
            Ok(Some(raw)) => (rehydrate(&raw), false),
            Ok(None) => (Vec::new(), false),
            Err(e) => {
                warn!(error = %e, "Could not load stored cart, starting empty");
                (Vec::new(), true)
            }
        };

        info!(lines = items.len(), "Cart opened");

        CartStore {
            items,
            storage: Box::new(storage),
            pricing,
            listeners: Vec::new(),
            next_subscription: 1,
            degraded,
        }
    }

    /// An empty cart over fresh in-memory storage.
    pub fn in_memory(pricing: Pricing) -> Self {
        Self::open(MemoryStorage::new(), pricing)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds a product, merging into an existing line with the same key.
    ///
    /// ## Behavior
    /// - Missing id/name/image, or price ≤ 0: `Validation` error
    /// - Quantity missing or ≤ 0: treated as 1
    /// - Existing line: quantity increases (name and price stay as first added)
    /// - New line: appended at the end
    ///
    /// Returns the resulting line.
    pub fn add_item(&mut self, input: NewLineItem) -> CoreResult<LineItem> {
        let product_id = input.product_id.as_deref().unwrap_or_default().trim();
        validate_required("Product", product_id)?;
        validate_product_name(input.name.as_deref().unwrap_or_default())?;
        validate_required("Image", input.image.as_deref().unwrap_or_default())?;
        let unit_price = input
            .unit_price
            .ok_or_else(|| ValidationError::required("Price"))?;
        validate_unit_price(unit_price)?;

        let requested = input.quantity.filter(|q| *q > 0).unwrap_or(1);
        let key = input.key();

        let line = if let Some(index) = self.position(&key) {
            let merged = i64::from(self.items[index].quantity).saturating_add(requested);
            let quantity = checked_quantity(merged)?;
            self.items[index].quantity = quantity;
            debug!(key = %key, quantity, "Merged into existing cart line");
            self.items[index].clone()
        } else {
            let quantity = checked_quantity(requested)?;
            if self.items.len() >= MAX_CART_LINES {
                return Err(CoreError::CartTooLarge {
                    max: MAX_CART_LINES,
                });
            }
            let line = LineItem {
                product_id: key.product_id.clone(),
                name: input.name.unwrap_or_default().trim().to_string(),
                unit_price,
                image: input.image.unwrap_or_default().trim().to_string(),
                size: key.size.clone(),
                color: key.color.clone(),
                quantity,
                sku: input.sku.filter(|s| !s.trim().is_empty()),
                category: input.category.filter(|c| !c.trim().is_empty()),
            };
            debug!(key = %key, quantity, "Added cart line");
            self.items.push(line.clone());
            line
        };

        self.changed();
        Ok(line)
    }

    /// Removes the line with `key`. Absent keys are a no-op (still notifies).
    pub fn remove_item(&mut self, key: &ItemKey) {
        let before = self.items.len();
        self.items.retain(|item| !item.matches(key));
        debug!(key = %key, removed = before != self.items.len(), "Remove cart line");
        self.changed();
    }

    /// Sets a line's quantity; zero or below removes it.
    ///
    /// Quantities above MAX_ITEM_QUANTITY are rejected without changes. An
    /// unknown key with a positive quantity is a no-op.
    pub fn update_quantity(&mut self, key: &ItemKey, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            self.remove_item(key);
            return Ok(());
        }

        let quantity = checked_quantity(quantity)?;
        if let Some(index) = self.position(key) {
            self.items[index].quantity = quantity;
            debug!(key = %key, quantity, "Updated cart line quantity");
        } else {
            debug!(key = %key, "Quantity update for unknown line ignored");
        }

        self.changed();
        Ok(())
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        debug!(lines = self.items.len(), "Clearing cart");
        self.items.clear();
        self.changed();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Read-only view of the lines, in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Owned copy of the lines.
    pub fn snapshot(&self) -> Vec<LineItem> {
        self.items.clone()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&LineItem> {
        self.items.iter().find(|item| item.matches(key))
    }

    /// Sum of all quantities.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn totals(&self, method: Option<ShippingMethod>) -> Totals {
        self.pricing.totals(&self.items, method)
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    /// Items, count and rounded default-method totals for the checkout page.
    pub fn checkout_summary(&self) -> CartSummary {
        CartSummary {
            items: self.snapshot(),
            item_count: self.item_count(),
            totals: self.totals(None).rounded(),
        }
    }

    /// True while the last save failed (the cart lives only in memory).
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Registers a listener called after every mutating call.
    pub fn subscribe(&mut self, listener: impl Fn(&CartChange) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        before != self.listeners.len()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn position(&self, key: &ItemKey) -> Option<usize> {
        self.items.iter().position(|item| item.matches(key))
    }

    fn changed(&mut self) {
        self.persist();

        let change = CartChange {
            item_count: self.item_count(),
            line_count: self.items.len() as u32,
            totals: self.totals(None),
        };
        for (_, listener) in &self.listeners {
            listener(&change);
        }
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.items)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))
            .and_then(|raw| self.storage.save(CART_STORAGE_KEY, &raw));

        match result {
            Ok(()) => {
                if self.degraded {
                    info!("Cart storage recovered");
                }
                self.degraded = false;
            }
            Err(e) => {
                warn!(error = %e, "Could not save cart, keeping it in memory");
                self.degraded = true;
            }
        }
    }
}

fn checked_quantity(quantity: i64) -> CoreResult<u32> {
    if quantity > i64::from(MAX_ITEM_QUANTITY) {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: i64::from(MAX_ITEM_QUANTITY),
        });
    }
    validate_quantity(quantity)?;
    u32::try_from(quantity).map_err(|_| CoreError::QuantityTooLarge {
        requested: quantity,
        max: i64::from(MAX_ITEM_QUANTITY),
    })
}

/// Parses a stored cart, dropping what cannot be a line.
///
/// - Not a JSON array: empty cart
/// - Entries that fail to parse or have quantity 0: dropped
/// - Duplicate keys: merged (capped at MAX_ITEM_QUANTITY)
/// - More than MAX_CART_LINES lines: the extra lines are dropped
fn rehydrate(raw: &str) -> Vec<LineItem> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %PersistenceError::Corrupt(e.to_string()), "Discarding stored cart");
            return Vec::new();
        }
    };

    let total = entries.len();
    let mut items: Vec<LineItem> = Vec::with_capacity(total);
    for entry in entries {
        let item: LineItem = match serde_json::from_value(entry) {
            Ok(item) => item,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable cart entry");
                continue;
            }
        };
        if item.quantity == 0 {
            continue;
        }

        let key = item.key();
        if let Some(existing) = items.iter_mut().find(|i| i.matches(&key)) {
            existing.quantity = existing
                .quantity
                .saturating_add(item.quantity)
                .min(MAX_ITEM_QUANTITY);
        } else if items.len() < MAX_CART_LINES {
            let mut item = item;
            item.quantity = item.quantity.min(MAX_ITEM_QUANTITY);
            items.push(item);
        }
    }

    if items.len() != total {
        debug!(stored = total, kept = items.len(), "Repaired stored cart");
    }
    items
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn shirt() -> NewLineItem {
        NewLineItem::new("1", "Camisa Lino", Money::from_cents(4990), "/img/1.jpg")
            .with_variant("M", "Blanco")
    }

    fn cart() -> CartStore {
        CartStore::in_memory(Pricing::default())
    }

    struct FailingStorage;

    impl CartStorage for FailingStorage {
        fn load(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }

        fn save(&self, key: &str, _value: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io {
                key: key.into(),
                reason: "read-only".into(),
            })
        }
    }

    #[test]
    fn test_add_item_defaults_quantity_to_one() {
        let mut cart = cart();
        let line = cart.add_item(shirt()).unwrap();
        assert_eq!(line.quantity, 1);
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_add_same_key_merges() {
        let mut cart = cart();
        cart.add_item(shirt().with_quantity(2)).unwrap();
        cart.add_item(shirt().with_quantity(3)).unwrap();
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_different_variant_is_new_line() {
        let mut cart = cart();
        cart.add_item(shirt()).unwrap();
        cart.add_item(shirt().with_variant("L", "Blanco")).unwrap();
        assert_eq!(cart.line_count(), 2);
    }

    #[test]
    fn test_non_positive_quantity_never_reduces_a_line() {
        let mut cart = cart();
        cart.add_item(shirt().with_quantity(4)).unwrap();
        cart.add_item(shirt().with_quantity(-2)).unwrap();
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_merge_keeps_first_name_and_price() {
        let mut cart = cart();
        cart.add_item(shirt()).unwrap();
        let mut repriced = shirt();
        repriced.unit_price = Some(Money::from_cents(100));
        repriced.name = Some("Otro".into());
        cart.add_item(repriced).unwrap();
        assert_eq!(cart.items()[0].unit_price, Money::from_cents(4990));
        assert_eq!(cart.items()[0].name, "Camisa Lino");
    }

    #[test]
    fn test_add_item_validation() {
        let mut cart = cart();

        let mut no_image = shirt();
        no_image.image = Some("  ".into());
        assert!(matches!(cart.add_item(no_image), Err(CoreError::Validation(_))));

        let mut free = shirt();
        free.unit_price = Some(Money::zero());
        assert!(matches!(cart.add_item(free), Err(CoreError::Validation(_))));

        assert!(matches!(cart.add_item(NewLineItem::default()), Err(CoreError::Validation(_))));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quantity_limit_leaves_cart_unchanged() {
        let mut cart = cart();
        cart.add_item(shirt().with_quantity(998)).unwrap();
        let err = cart.add_item(shirt().with_quantity(5)).unwrap_err();
        assert!(matches!(err, CoreError::QuantityTooLarge { requested: 1003, max: 999 }));
        assert_eq!(cart.items()[0].quantity, 998);
    }

    #[test]
    fn test_huge_add_to_existing_line_is_rejected() {
        let mut cart = cart();
        cart.add_item(shirt().with_quantity(5)).unwrap();
        let before = cart.totals(None);

        let err = cart.add_item(shirt().with_quantity(i64::MAX)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::QuantityTooLarge { requested: i64::MAX, max: 999 }
        ));
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
        assert_eq!(cart.totals(None), before);
    }

    #[test]
    fn test_checked_quantity_bounds() {
        assert_eq!(checked_quantity(1).unwrap(), 1);
        assert_eq!(checked_quantity(999).unwrap(), 999);
        assert!(matches!(checked_quantity(0), Err(CoreError::Validation(_))));
        assert!(matches!(checked_quantity(-4), Err(CoreError::Validation(_))));
        assert!(matches!(
            checked_quantity(1000),
            Err(CoreError::QuantityTooLarge { requested: 1000, .. })
        ));
    }

    #[test]
    fn test_line_limit() {
        let mut cart = cart();
        for i in 0..MAX_CART_LINES {
            cart.add_item(NewLineItem::new(i.to_string(), "X", Money::from_cents(100), "x.jpg"))
                .unwrap();
        }
        let err = cart
            .add_item(NewLineItem::new("extra", "X", Money::from_cents(100), "x.jpg"))
            .unwrap_err();
        assert!(matches!(err, CoreError::CartTooLarge { .. }));
        // merging into an existing line is still allowed
        assert!(cart
            .add_item(NewLineItem::new("0", "X", Money::from_cents(100), "x.jpg"))
            .is_ok());
    }

    #[test]
    fn test_update_quantity() {
        let mut cart = cart();
        cart.add_item(shirt()).unwrap();
        let key = ItemKey::new("1", Some("M"), Some("Blanco"));

        cart.update_quantity(&key, 7).unwrap();
        assert_eq!(cart.get(&key).unwrap().quantity, 7);

        assert!(cart.update_quantity(&key, 1000).is_err());
        assert_eq!(cart.get(&key).unwrap().quantity, 7);

        cart.update_quantity(&key, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_unknown_line_is_noop() {
        let mut cart = cart();
        cart.add_item(shirt()).unwrap();
        cart.update_quantity(&ItemKey::new("9", None, None), 3).unwrap();
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_every_mutation_persists() {
        let storage = MemoryStorage::new();
        let mut cart = CartStore::open(storage.clone(), Pricing::default());
        cart.add_item(shirt().with_quantity(2)).unwrap();

        let stored: Vec<LineItem> =
            serde_json::from_str(&storage.get(CART_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored, cart.snapshot());

        cart.clear();
        assert_eq!(storage.get(CART_STORAGE_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn test_reopen_restores_cart() {
        let storage = MemoryStorage::new();
        {
            let mut cart = CartStore::open(storage.clone(), Pricing::default());
            cart.add_item(shirt().with_quantity(2)).unwrap();
        }
        let cart = CartStore::open(storage, Pricing::default());
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.items()[0].size, "M");
    }

    #[test]
    fn test_corrupt_storage_loads_empty() {
        let storage = MemoryStorage::with_entry(CART_STORAGE_KEY, "{not json");
        let cart = CartStore::open(storage, Pricing::default());
        assert!(cart.is_empty());
        assert!(!cart.is_degraded());
    }

    #[test]
    fn test_rehydrate_repairs_entries() {
        let raw = r#"[
            {"id":"1","name":"A","price":10,"image":"a","quantity":2},
            {"id":"1","name":"A","price":10,"image":"a","size":"Única","color":"Estándar","quantity":3},
            {"id":"2","name":"B","price":5,"image":"b","quantity":0},
            {"id":"3","name":"C","price":5,"image":"c","quantity":-4},
            {"garbage":true}
        ]"#;
        let items = rehydrate(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
    }

    #[test]
    fn test_failed_save_keeps_mutation_and_flags_degraded() {
        let mut cart = CartStore::open(FailingStorage, Pricing::default());
        assert!(cart.is_empty());
        cart.add_item(shirt()).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert!(cart.is_degraded());
    }

    #[test]
    fn test_subscribers_see_every_mutation() {
        let seen: Arc<Mutex<Vec<CartChange>>> = Arc::default();
        let mut cart = cart();
        let sink = seen.clone();
        let id = cart.subscribe(move |change| sink.lock().unwrap().push(*change));

        cart.add_item(shirt().with_quantity(2)).unwrap();
        cart.remove_item(&ItemKey::new("missing", None, None));
        cart.clear();

        {
            let seen = seen.lock().unwrap();
            let counts: Vec<u32> = seen.iter().map(|c| c.item_count).collect();
            assert_eq!(counts, vec![2, 2, 0]);
            assert_eq!(seen[0].totals.subtotal, Money::from_cents(9980));
        }

        assert!(cart.unsubscribe(id));
        assert!(!cart.unsubscribe(id));
        cart.add_item(shirt()).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_rejected_add_does_not_notify() {
        let seen: Arc<Mutex<u32>> = Arc::default();
        let mut cart = cart();
        let sink = seen.clone();
        cart.subscribe(move |_| *sink.lock().unwrap() += 1);
        let _ = cart.add_item(NewLineItem::default());
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_checkout_summary_is_rounded() {
        let mut cart = cart();
        cart.add_item(shirt()).unwrap();
        let summary = cart.checkout_summary();
        assert_eq!(summary.item_count, 1);
        assert_eq!(summary.totals.tax, Money::from_cents(1048));
        assert_eq!(summary.totals.total, Money::from_cents(4990 + 1048 + 495));
    }
}
