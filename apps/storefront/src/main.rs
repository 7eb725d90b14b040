//! # Vourne Storefront Entry Point
//!
//! ```text
//! vourne-storefront [CONFIG_PATH]
//!
//! CONFIG_PATH   TOML file; defaults to the platform config dir
//!               (~/.config/vourne/vourne.toml on Linux)
//! RUST_LOG      log filter, e.g. "debug" or "info,vourne=trace"
//! VOURNE_*      per-value overrides (see config.rs)
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing (stderr)
//! 2. Load configuration, falling back to defaults
//! 3. Serve JSON commands on stdin until it closes

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use vourne_storefront::config::StorefrontConfig;

#[tokio::main]
async fn main() -> ExitCode {
    vourne_storefront::init_tracing();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = StorefrontConfig::load_or_default(config_path);

    match vourne_storefront::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Storefront stopped");
            ExitCode::FAILURE
        }
    }
}
