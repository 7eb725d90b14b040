//! # Vourne Storefront Library
//!
//! The storefront engine behind the Vourne shop pages: the persisted cart,
//! the three-step checkout and the order backend client.
//!
//! ## Module Organization
//! ```text
//! vourne_storefront/
//! ├── lib.rs          ◄─── You are here (tracing setup & command loop)
//! ├── config.rs       ◄─── TOML + VOURNE_* environment configuration
//! ├── state/          ◄─── Storefront: cart, checkout session, backends
//! ├── commands/
//! │   ├── cart.rs     ◄─── add_to_cart, update_cart_item, ...
//! │   └── checkout.rs ◄─── begin_checkout, set_field, next_step, ...
//! ├── http.rs         ◄─── reqwest clients for the PHP endpoints
//! └── error.rs        ◄─── API error type for commands
//! ```
//!
//! ## Command Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   stdin  ── one JSON command per line ──►  Command::parse               │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │                                    commands::dispatch_until             │
//! │                                    (Ctrl-C cancels a submission)        │
//! │                                                 │                       │
//! │   stdout ◄── one JSON Reply per line ───────────┘                       │
//! │                                                                         │
//! │   stderr ◄── tracing output (RUST_LOG, default info,vourne=debug)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod state;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use commands::{Command, Reply};
use config::StorefrontConfig;
use error::ApiError;
use state::Storefront;

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - ERROR: Failures that lose data (cart not saved)
/// - WARN: Recoverable problems (backend refused an order, bad config value)
/// - INFO: Checkout milestones
/// - DEBUG: Every command and step change
///
/// Logs go to stderr; stdout carries the replies.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vourne=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Runs the command loop until stdin closes.
///
/// ## Startup Sequence
/// 1. Build the storefront state (cart file, HTTP backends)
/// 2. Read one command per line
/// 3. Write one reply per line
pub async fn run(config: StorefrontConfig) -> std::io::Result<()> {
    let mut store = Storefront::from_config(&config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    info!(store = %config.store.name, "Vourne storefront listening on stdin");
    serve(
        &mut store,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Reads commands from `input` and writes replies to `output`.
pub async fn serve<R, W>(store: &mut Storefront, input: R, mut output: W) -> std::io::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match Command::parse(line) {
            Ok(command) => commands::dispatch_until(store, command, interrupted()).await,
            Err(e) => {
                warn!(error = %e, "Unparseable command");
                Reply::error(e)
            }
        };

        let encoded = match serde_json::to_string(&reply) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "Failed to encode reply");
                serde_json::to_string(&Reply::error(ApiError::internal("Failed to encode reply")))
                    .map_err(std::io::Error::other)?
            }
        };

        output.write_all(encoded.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

/// Completes on Ctrl-C. Never completes if the signal cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
