//! # podctx Receiver Configuration
//!
//! File: cli/src/commands/srv/config.rs
//!
//! ## Overview
//!
//! Resolves the effective settings of the `podctx srv` receiver. Settings
//! come from, in order of precedence:
//! 1. Command-line arguments
//! 2. The `[server]` table of the merged podctx configuration
//!    (`.podctx.toml` in the project, `config.toml` in the user config dir)
//! 3. Built-in defaults
//!
//! ## Examples
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9000
//! scratch_dir = "~/.cache/podctx"
//! strict_content_type = true
//! ```
//!
//! ```rust
//! let config = load_and_merge_config(args).await?;
//! println!("Listening on: {}:{}", config.host, config.port);
//! ```
//!
use crate::core::config::{self as core_config, ServerSettings};
use crate::core::error::Result;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::debug;

/// # Receiver Command Arguments (`SrvArgs`)
///
/// Every option is optional so that an omitted flag falls through to the
/// configuration file instead of silently overriding it with a default.
#[derive(Parser, Debug, Default)]
pub struct SrvArgs {
    /// IP address to bind to (default 127.0.0.1).
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to listen on (default 8080). The next free port is used if it is taken.
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Parent directory for per-request scratch directories (default: system temp dir).
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Reject unsupported Content-Type values on the compat route too.
    #[arg(long)]
    pub strict: bool,
}

/// # Effective Receiver Configuration (`ServerConfig`)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Where per-request scratch directories are created. `None` means the
    /// system temp directory.
    pub scratch_root: Option<PathBuf>,
    /// When set, unknown content types are rejected on every route.
    pub strict_content_type: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::merge(&SrvArgs::default(), &ServerSettings::default())
    }
}

impl ServerConfig {
    /// Applies `args` on top of the file `settings`.
    pub fn merge(args: &SrvArgs, settings: &ServerSettings) -> Self {
        Self {
            host: args.host.unwrap_or(settings.host),
            port: args.port.unwrap_or(settings.port),
            scratch_root: args
                .scratch_dir
                .clone()
                .or_else(|| settings.scratch_dir.as_ref().map(PathBuf::from)),
            strict_content_type: args.strict || settings.strict_content_type,
        }
    }
}

/// # Load and Merge Receiver Configuration (`load_and_merge_config`)
///
/// Loads the podctx configuration files and overlays the command-line
/// arguments.
///
/// ## Errors
///
/// Returns an error if a configuration file exists but cannot be read,
/// parsed or validated.
pub async fn load_and_merge_config(args: SrvArgs) -> Result<ServerConfig> {
    let file_config = core_config::load_config()?;
    let merged = ServerConfig::merge(&args, &file_config.server);
    debug!("Merged receiver configuration: {:?}", merged);
    Ok(merged)
}
