//! # Storage Error Types
//!
//! Error types for file-backed cart storage.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io::Error                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StorageError (this module) ← Adds the path and the operation           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PersistenceError (vourne-core) ← What CartStore logs and recovers from │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;
use vourne_core::PersistenceError;

/// File storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No data directory configured and the platform has none.
    ///
    /// ## When This Occurs
    /// - No home directory for the current user
    /// - Sandboxed environments without a data dir
    #[error("No data directory available; set [storage] data_dir or VOURNE_DATA_DIR")]
    NoDataDir,

    /// The data directory could not be created.
    #[error("Cannot create data directory {path}: {reason}")]
    CreateDir { path: PathBuf, reason: String },

    /// Reading a stored value failed.
    ///
    /// ## When This Occurs
    /// - Permission denied
    /// - The file is not valid UTF-8
    #[error("Cannot read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Writing or replacing a stored value failed.
    ///
    /// ## When This Occurs
    /// - Disk full
    /// - Read-only file system
    #[error("Cannot write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Keys become file names, so only `[A-Za-z0-9_-]` is accepted.
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

impl StorageError {
    pub(crate) fn read(path: &Path, err: std::io::Error) -> Self {
        StorageError::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, err: std::io::Error) -> Self {
        StorageError::Write {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    /// Converts to the core persistence taxonomy.
    ///
    /// ## Error Mapping
    /// ```text
    /// NoDataDir / CreateDir  → PersistenceError::Unavailable
    /// Read / Write           → PersistenceError::Io
    /// InvalidKey             → PersistenceError::Io
    /// ```
    pub fn into_persistence(self, key: &str) -> PersistenceError {
        match self {
            StorageError::NoDataDir | StorageError::CreateDir { .. } => {
                PersistenceError::Unavailable(self.to_string())
            }
            other => PersistenceError::Io {
                key: key.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
