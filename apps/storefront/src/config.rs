//! # Storefront Configuration
//!
//! Settings for pricing, checkout rules, storage and the order backend.
//!
//! ## Configuration Sources (in priority order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Loading                                │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     VOURNE_TAX_RATE_BPS=2100                                            │
//! │     VOURNE_ORDER_ENDPOINT=https://vourne.es/php/process-order.php       │
//! │     VOURNE_EMAIL_CHECK_ENDPOINT=https://vourne.es/php/check-email.php   │
//! │     VOURNE_DATA_DIR=/var/lib/vourne                                     │
//! │     VOURNE_API_TIMEOUT_SECS=15                                          │
//! │                                                                         │
//! │  2. Config File (vourne.toml)                                           │
//! │     ~/.config/vourne/vourne.toml (Linux)                                │
//! │     ~/Library/Application Support/com.vourne.store/vourne.toml (macOS)  │
//! │                                                                         │
//! │  3. Defaults (lowest priority)                                          │
//! │     IVA 21%, standard 4.95, express 9.95, free from 100.00              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Config File
//! ```toml
//! [store]
//! name = "Vourne"
//! tax_rate_bps = 2100
//!
//! [shipping]
//! standard = "4.95"
//! express = "9.95"
//! free_threshold = "100.00"
//!
//! [checkout]
//! countries = ["ES", "PT", "FR"]
//!
//! [api]
//! order_endpoint = "https://vourne.es/php/process-order.php"
//! timeout_secs = 15
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};
use vourne_core::validation::{validate_shipping_cost, validate_tax_rate_bps};
use vourne_core::{CheckoutRules, CheckoutSettings, Money, Pricing, ShippingTable, TaxRate};
use vourne_storage::StorageConfig;

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Cannot read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// The config file is not valid TOML for this schema.
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// An endpoint is not an http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// [store]
// =============================================================================

/// Store identity and tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// IVA in basis points (2100 = 21%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,
}

fn default_store_name() -> String {
    "Vourne".to_string()
}

fn default_currency_symbol() -> String {
    "€".to_string()
}

fn default_tax_rate_bps() -> u32 {
    TaxRate::IVA.bps()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
            currency_symbol: default_currency_symbol(),
            tax_rate_bps: default_tax_rate_bps(),
        }
    }
}

// =============================================================================
// [shipping]
// =============================================================================

/// Shipping prices as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSettings {
    #[serde(default = "default_standard")]
    pub standard: Money,

    #[serde(default = "default_express")]
    pub express: Money,

    #[serde(default)]
    pub free: Money,

    /// Subtotal from which every method ships free. Unset disables it.
    #[serde(default = "default_free_threshold")]
    pub free_threshold: Option<Money>,
}

fn default_standard() -> Money {
    ShippingTable::default().standard
}

fn default_express() -> Money {
    ShippingTable::default().express
}

fn default_free_threshold() -> Option<Money> {
    ShippingTable::default().free_threshold
}

impl Default for ShippingSettings {
    fn default() -> Self {
        ShippingSettings {
            standard: default_standard(),
            express: default_express(),
            free: Money::zero(),
            free_threshold: default_free_threshold(),
        }
    }
}

impl ShippingSettings {
    pub fn table(&self) -> ShippingTable {
        ShippingTable {
            standard: self.standard,
            express: self.express,
            free: self.free,
            free_threshold: self.free_threshold,
        }
    }
}

// =============================================================================
// [api]
// =============================================================================

/// Order backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// POST target for finalized orders.
    #[serde(default = "default_order_endpoint")]
    pub order_endpoint: String,

    /// GET `?email=` target answering `{"available": bool}`.
    /// Unset skips the remote check on the first step.
    #[serde(default)]
    pub email_check_endpoint: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_order_endpoint() -> String {
    "http://localhost:8080/php/process-order.php".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            order_endpoint: default_order_endpoint(),
            email_check_endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// =============================================================================
// Storefront Config
// =============================================================================

/// Complete storefront configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub shipping: ShippingSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiSettings,
}

impl StorefrontConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Override with config file (if it exists)
    /// 3. Override with `VOURNE_*` environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates ranges, patterns and endpoints.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_tax_rate_bps(self.store.tax_rate_bps)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let shipping = &self.shipping;
        for (field, cost) in [
            ("shipping.standard", shipping.standard),
            ("shipping.express", shipping.express),
            ("shipping.free", shipping.free),
        ] {
            validate_shipping_cost(field, cost).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        if let Some(threshold) = shipping.free_threshold {
            validate_shipping_cost("shipping.free_threshold", threshold)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        self.rules()?;

        validate_endpoint(&self.api.order_endpoint)?;
        if let Some(ref url) = self.api.email_check_endpoint {
            validate_endpoint(url)?;
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `VOURNE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bps) = lookup("VOURNE_TAX_RATE_BPS") {
            match bps.trim().parse::<u32>() {
                Ok(bps) => {
                    debug!(bps, "Overriding tax rate from environment");
                    self.store.tax_rate_bps = bps;
                }
                Err(_) => warn!(value = %bps, "Ignoring non-numeric VOURNE_TAX_RATE_BPS"),
            }
        }

        if let Some(url) = lookup("VOURNE_ORDER_ENDPOINT") {
            debug!(url = %url, "Overriding order endpoint from environment");
            self.api.order_endpoint = url;
        }

        if let Some(url) = lookup("VOURNE_EMAIL_CHECK_ENDPOINT") {
            self.api.email_check_endpoint = Some(url).filter(|u| !u.trim().is_empty());
        }

        if let Some(dir) = lookup("VOURNE_DATA_DIR") {
            debug!(dir = %dir, "Overriding data directory from environment");
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(secs) = lookup("VOURNE_API_TIMEOUT_SECS") {
            if let Ok(secs) = secs.trim().parse::<u64>() {
                self.api.timeout_secs = secs;
            }
        }
    }

    /// Tax rate and shipping table for the cart.
    pub fn pricing(&self) -> Pricing {
        Pricing::new(TaxRate::from_bps(self.store.tax_rate_bps), self.shipping.table())
    }

    /// Compiled checkout rules.
    pub fn rules(&self) -> ConfigResult<CheckoutRules> {
        CheckoutRules::new(&self.checkout).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "vourne", "vourne")
            .map(|dirs| dirs.config_dir().join("vourne.toml"))
    }
}

fn validate_endpoint(url: &str) -> ConfigResult<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint must start with http:// or https://, got: {}",
            url
        )));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
