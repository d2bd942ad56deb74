//! # podctx Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module implements the configuration system for podctx, handling loading,
//! merging, validation, and access to configuration data. It combines defaults,
//! user settings, and project-specific overrides.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Project-specific `.podctx.toml` in the current directory or ancestors
//!    (the search stops at a directory containing `.git`)
//! 2. User-specific `config.toml` in the platform config directory
//! 3. Default values defined in the code
//!
//! Command-line flags are applied on top by the individual command handlers.
//!
//! ## Examples
//!
//! ```rust
//! let cfg = config::load_config()?;
//! let options = cfg.archive.options();
//! let port = cfg.server.port;
//! ```
//!
use crate::core::error::{PodctxError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::common::archive::ArchiveOptions;

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Settings for producing build-context archives.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Gzip level, 0 (store) through 9 (best).
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
    /// Capacity in bytes of the pipe between the archive worker and its reader.
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,
    /// Extra exclusion patterns applied by `podctx archive`.
    #[serde(default)]
    pub default_excludes: Vec<String>,
}

/// Settings for the `podctx srv` build-context receiver.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: IpAddr,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Parent directory for per-request scratch directories (can use ~).
    #[serde(default)]
    pub scratch_dir: Option<String>,
    /// Reject unknown content types on the compat route as well.
    #[serde(default)]
    pub strict_content_type: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            pipe_capacity: default_pipe_capacity(),
            default_excludes: Vec::new(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            scratch_dir: None,
            strict_content_type: false,
        }
    }
}

impl ArchiveConfig {
    /// Converts the configured values into producer options.
    pub fn options(&self) -> ArchiveOptions {
        ArchiveOptions {
            compression: flate2::Compression::new(self.compression_level),
            pipe_capacity: self.pipe_capacity,
        }
    }
}

fn default_compression_level() -> u32 {
    6
}
fn default_pipe_capacity() -> usize {
    64 * 1024
}
fn default_server_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_server_port() -> u16 {
    8080
}

const PROJECT_CONFIG_FILENAME: &str = ".podctx.toml";

pub fn load_config() -> Result<Config> {
    let user_config = load_user_config()?;
    let project_config = load_project_config()?;
    let mut merged_config = merge_configs(user_config.unwrap_or_default(), project_config);
    expand_config_paths(&mut merged_config).context("Failed to expand paths in configuration")?;
    validate_config(&merged_config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged_config);
    Ok(merged_config)
}

fn load_user_config() -> Result<Option<Config>> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "podctx") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<Config>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    if let Some(project_config_path) = find_project_config_path(&current_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.podctx.toml) found in current directory or ancestors.");
        Ok(None)
    }
}

fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project_cfg = match project {
        Some(p) => p,
        None => return user,
    };
    let mut merged = Config::default();
    merged.archive.compression_level =
        if project_cfg.archive.compression_level != default_compression_level() {
            project_cfg.archive.compression_level
        } else {
            user.archive.compression_level
        };
    merged.archive.pipe_capacity = if project_cfg.archive.pipe_capacity != default_pipe_capacity()
    {
        project_cfg.archive.pipe_capacity
    } else {
        user.archive.pipe_capacity
    };
    merged.archive.default_excludes = if !project_cfg.archive.default_excludes.is_empty() {
        project_cfg.archive.default_excludes
    } else {
        user.archive.default_excludes
    };
    merged.server.host = if project_cfg.server.host != default_server_host() {
        project_cfg.server.host
    } else {
        user.server.host
    };
    merged.server.port = if project_cfg.server.port != default_server_port() {
        project_cfg.server.port
    } else {
        user.server.port
    };
    merged.server.scratch_dir = project_cfg.server.scratch_dir.or(user.server.scratch_dir);
    merged.server.strict_content_type =
        project_cfg.server.strict_content_type || user.server.strict_content_type;
    merged
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    if let Some(dir) = config.server.scratch_dir.as_mut() {
        *dir = shellexpand::tilde(dir).into_owned();
        debug!("Expanded scratch directory: {}", dir);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    info!("Validating final configuration...");
    if config.archive.compression_level > 9 {
        return Err(anyhow!(PodctxError::Config(format!(
            "Invalid compression level {}. Expected a value between 0 and 9.",
            config.archive.compression_level
        ))));
    }
    if config.archive.pipe_capacity == 0 {
        return Err(anyhow!(PodctxError::Config(
            "Pipe capacity must be greater than zero.".to_string()
        )));
    }
    if let Some(dir) = &config.server.scratch_dir {
        let scratch = PathBuf::from(dir);
        if !scratch.exists() {
            warn!(
                "Configured scratch directory '{}' does not exist; it will be created on demand.",
                scratch.display()
            );
        } else if !scratch.is_dir() {
            return Err(anyhow!(PodctxError::Config(format!(
                "Configured scratch path '{}' exists but is not a directory.",
                scratch.display()
            ))));
        }
    }
    info!("Configuration validation successful.");
    Ok(())
}
