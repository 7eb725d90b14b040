//! # Cart Storage
//!
//! The durable key/value seam the cart persists through.
//!
//! ```text
//! ┌──────────────┐  save("vourneo_cart", json)   ┌──────────────────────┐
//! │  CartStore   │ ─────────────────────────────► │ dyn CartStorage      │
//! │ (vourne-core)│ ◄───────────────────────────── │  MemoryStorage (here)│
//! └──────────────┘  load("vourneo_cart")          │  FileStorage         │
//!                                                 │   (vourne-storage)   │
//!                                                 └──────────────────────┘
//! ```
//!
//! Both calls are synchronous; the last writer wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::PersistenceError;

/// Key the serialized cart lives under.
pub const CART_STORAGE_KEY: &str = "vourneo_cart";

/// Synchronous string key/value storage.
pub trait CartStorage: Send {
    /// Returns the stored value, `None` when the key was never written.
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Replaces the value stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

impl<S: CartStorage + Sync + ?Sized> CartStorage for Arc<S> {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).save(key, value)
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

/// In-process storage. Clones share the same entries, which lets a test
/// "reload the page" by opening a second cart over a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with one value.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        if let Ok(mut entries) = storage.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        storage
    }

    /// Raw stored value, for inspection.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory storage poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory storage poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_none() {
        let storage = MemoryStorage::new();
        assert!(storage.load(CART_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.save(CART_STORAGE_KEY, "[]").unwrap();
        assert_eq!(other.load(CART_STORAGE_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_last_writer_wins() {
        let storage = MemoryStorage::with_entry(CART_STORAGE_KEY, "[1]");
        storage.save(CART_STORAGE_KEY, "[2]").unwrap();
        assert_eq!(storage.get(CART_STORAGE_KEY).as_deref(), Some("[2]"));
    }
}
