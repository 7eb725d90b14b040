//! # File Storage
//!
//! One JSON file per storage key inside the storefront's data directory.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  <data_dir>/                                                            │
//! │  ├── vourneo_cart.json        current value                             │
//! │  └── vourneo_cart.json.tmp    only while a save is in flight            │
//! │                                                                         │
//! │  save(): write .tmp ──► rename over .json                               │
//! │  A crash mid-save leaves the previous value readable.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Directory
//! `[storage] data_dir` when set, otherwise the platform data directory
//! (`~/.local/share/vourne`, `~/Library/Application Support/com.vourne.vourne`,
//! `%APPDATA%\vourne\vourne\data`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vourne_core::{CartStorage, PersistenceError};

use crate::error::{StorageError, StorageResult};

// =============================================================================
// Configuration
// =============================================================================

/// The `[storage]` config section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where stored values live. Platform data dir when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        StorageConfig {
            data_dir: Some(dir.into()),
        }
    }

    /// The configured directory, or the platform default.
    pub fn resolve_dir(&self) -> StorageResult<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir().ok_or(StorageError::NoDataDir),
        }
    }
}

/// Platform data directory for the storefront.
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "vourne", "vourne").map(|dirs| dirs.data_dir().to_path_buf())
}

// =============================================================================
// File Storage
// =============================================================================

/// [`CartStorage`] backed by files in one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) the configured directory.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        let dir = config.resolve_dir()?;
        fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDir {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        info!(dir = %dir.display(), "File storage opened");
        Ok(FileStorage { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the value of `key`.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Reads `key`; `None` when it was never written.
    pub fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(key, bytes = raw.len(), "Loaded stored value");
                Ok(Some(raw))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::read(&path, e)),
        }
    }

    /// Replaces `key` atomically.
    pub fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, value).map_err(|e| StorageError::write(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StorageError::write(&path, e)
        })?;

        debug!(key, bytes = value.len(), "Saved stored value");
        Ok(())
    }
}

impl CartStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.read(key).map_err(|e| e.into_persistence(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.write(key, value).map_err(|e| e.into_persistence(key))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
