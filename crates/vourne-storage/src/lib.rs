//! # vourne-storage: Durable Cart Storage
//!
//! File-system implementation of the [`vourne_core::CartStorage`] seam.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Persistence                                 │
//! │                                                                         │
//! │  CartStore::add_item (vourne-core)                                      │
//! │       │ serialize lines                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 vourne-storage (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐                        │   │
//! │  │   │ StorageConfig │───►│  FileStorage  │  load / save by key    │   │
//! │  │   │ data_dir      │    │  tmp + rename │                        │   │
//! │  │   └───────────────┘    └───────┬───────┘                        │   │
//! │  └────────────────────────────────┼────────────────────────────────┘   │
//! │                                   ▼                                     │
//! │   ~/.local/share/vourne/vourneo_cart.json                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vourne_core::{CartStore, Pricing};
//! use vourne_storage::{FileStorage, StorageConfig};
//!
//! let storage = FileStorage::open(&StorageConfig::default())?;
//! let cart = CartStore::open(storage, Pricing::default());
//! println!("{} items", cart.item_count());
//! # Ok::<(), vourne_storage::StorageError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod file;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StorageError, StorageResult};
pub use file::{default_data_dir, FileStorage, StorageConfig};
