//! # podctx Archive Utilities Module (`common::archive`)
//!
//! File: cli/src/common/archive/mod.rs
//!
//! ## Overview
//!
//! Everything that turns a build context into a gzipped tar stream and back:
//!
//! - **`tar`**: the producer. Walks the source roots on a blocking worker and
//!   streams the archive through a bounded pipe ([`build_archive`]).
//! - **`stream`**: the reader half handed to callers ([`ArchiveStream`]).
//! - **`extract`**: the consumer ([`extract`], [`extract_stream`]).
//! - **`patterns`**: `.containerignore` style exclusion rules.
//! - **`hardlinks`**: per-build `(device, inode)` tracking so hard-linked
//!   files are stored once.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::archive::{self, ArchiveOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let stream = archive::build_archive(&[], &[context_dir], &ArchiveOptions::default())?;
//! archive::extract_stream(stream, dest_dir).await?;
//! # Ok(())
//! # }
//! ```
//!

pub mod extract;
mod hardlinks;
pub mod patterns;
pub mod stream;
pub mod tar;

pub use self::extract::{extract, extract_stream};
pub use self::stream::ArchiveStream;
pub use self::tar::{build_archive, ArchiveOptions};
