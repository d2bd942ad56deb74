//! # podctx Build-Context Receiver (`podctx srv`)
//!
//! File: cli/src/commands/srv/mod.rs
//!
//! ## Overview
//!
//! Runs a small HTTP receiver for the archives produced by `podctx play`. It
//! extracts each request into a private scratch directory, decodes the
//! manifest, answers with a JSON report of what arrived and removes the
//! scratch directory again. Useful to check what a build service would get.
//!
//! ## Architecture
//!
//! - `config.rs`: CLI arguments and merging with the `[server]` config table
//! - `server_logic.rs`: axum router, handlers, report and error bodies
//! - `utils.rs`: scratch-space helpers (build dir, manifest lookup, logging)
//!
//! ## Examples
//!
//! ```bash
//! # Listen on the default address (127.0.0.1:8080)
//! podctx srv
//!
//! # Listen on all interfaces, keep scratch data on a big disk
//! podctx srv --host 0.0.0.0 --port 9000 --scratch-dir /data/podctx
//!
//! # Send a context to it
//! podctx play pod.yaml --context-dir ./ctx -o - |
//!   curl --data-binary @- -H 'Content-Type: application/x-tar' \
//!        http://127.0.0.1:8080/libpod/play/kube
//! ```
//!
use crate::core::error::Result;
use tracing::info;

pub use config::SrvArgs;

/// Receiver configuration loading and merging.
pub mod config;

/// Axum-based receiver implementation.
pub mod server_logic;

/// Scratch-space helpers for received contexts.
pub mod utils;

/// # Handle Server Command (`handle_srv`)
///
/// Entry point for `podctx srv`: merges configuration, then serves until
/// shutdown.
pub async fn handle_srv(args: SrvArgs) -> Result<()> {
    info!("Handling srv command with args: {:?}", args);

    let config = config::load_and_merge_config(args).await?;
    info!("Effective server config: {:?}", config);

    server_logic::run_server(config).await?;
    Ok(())
}
