//! # podctx Filesystem Utilities (`common::fs`)
//!
//! File: cli/src/common/fs/mod.rs
//!
//! ## Overview
//!
//! Foundational filesystem helpers shared by the archiver, context selection
//! and the receiver:
//!
//! - **`io`**: directory creation, verbatim file reads, shallow directory listing.
//! - **`scratch`**: per-request temporary directories that clean up after themselves.
//!
//! ```rust
//! use crate::common::fs::{io, scratch::ScratchDir};
//!
//! let scratch = ScratchDir::new("kube", None)?;
//! io::ensure_dir_exists(&scratch.path().join("build"))?;
//! let children = io::list_dir_names(context_dir)?;
//! ```
//!

/// Basic file I/O operations (`ensure_dir_exists`, `read_file_bytes`, `list_dir_names`).
pub mod io;
/// Self-removing scratch directories (`ScratchDir`).
pub mod scratch;
