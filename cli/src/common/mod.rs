//! # podctx Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! Shared building blocks used by the command handlers (`commands::`). Keeps
//! the command modules thin: they parse arguments, load configuration and
//! delegate here.
//!
//! ## Architecture
//!
//! - **`archive`**: streaming build-context archives (producer, consumer,
//!   ignore patterns, hard-link tracking).
//! - **`fs`**: filesystem helpers and self-removing scratch directories.
//! - **`kube`**: pod manifest decoding and build-context selection.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::{archive, kube};
//!
//! # async fn run(manifest: Vec<u8>) -> anyhow::Result<()> {
//! let selected = kube::select_context(&manifest, Path::new("./ctx"))?;
//! let stream = selected.into_archive(&archive::ArchiveOptions::default())?;
//! archive::extract_stream(stream, PathBuf::from("/tmp/out")).await?;
//! # Ok(())
//! # }
//! ```
//!

/// Build-context archive production and extraction.
pub mod archive;
/// Filesystem operations (I/O helpers, scratch directories).
pub mod fs;
/// Pod manifest decoding and build-context selection.
pub mod kube;
