//! # podctx Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types used throughout podctx. Two policies
//! coexist:
//!
//! - **Fail fast**: setup errors (bad patterns, no roots), manifest decode
//!   errors and every extraction error stop the operation immediately.
//! - **Continue and collect**: per-entry failures while archiving a context
//!   are pushed into a [`TraversalErrors`] accumulator and only surface when
//!   the archive stream ends or is closed.
//!
//! ## Architecture
//!
//! - `PodctxError`: domain error enum derived with `thiserror`.
//! - `TraversalErrors`: ordered multi-error container for the archive producer.
//! - `Result<T>`: alias for `anyhow::Result<T>` so call sites can attach context.
//!
//! ## Examples
//!
//! ```rust
//! // Setup errors are plain domain errors.
//! if roots.is_empty() {
//!     return Err(PodctxError::NoSources.into());
//! }
//!
//! // Distinguish out-of-space failures at the receiver boundary.
//! let err = PodctxError::from_extract_error(err);
//! ```
//!
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for podctx.
#[derive(Error, Debug)]
pub enum PodctxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filesystem error: {0}")]
    FileSystem(String),

    #[error("processing excludes list {patterns:?}: {reason}")]
    InvalidPattern {
        patterns: Vec<String>,
        reason: String,
    },

    #[error("no source(s) provided for build")]
    NoSources,

    #[error("path {} must be a regular file", .0.display())]
    NotRegularFile(PathBuf),

    #[error("unable to read kube YAML: {0}")]
    ManifestDecode(String),

    #[error("unable to read YAML as Kube Pod: {0}")]
    PodDecode(String),

    #[error("context directory may be too large: {source}")]
    ContextTooLarge { source: io::Error },

    #[error("{0}")]
    Traversal(TraversalErrors),

    #[error("archive worker failed: {0}")]
    Worker(String),

    #[error("Argument parsing error: {0}")]
    ArgumentParsing(String),
}

impl PodctxError {
    /// Maps an extraction failure to [`PodctxError::ContextTooLarge`] when the
    /// destination filesystem ran out of space, leaving other errors untouched.
    pub fn from_extract_error(err: anyhow::Error) -> anyhow::Error {
        let out_of_space = err.chain().any(|cause| {
            cause
                .downcast_ref::<io::Error>()
                .is_some_and(|io_err| io_err.kind() == io::ErrorKind::StorageFull)
        });
        if !out_of_space {
            return err;
        }
        match err.downcast::<io::Error>() {
            Ok(source) => PodctxError::ContextTooLarge { source }.into(),
            Err(err) => {
                let source = io::Error::new(io::ErrorKind::StorageFull, format!("{err:#}"));
                PodctxError::ContextTooLarge { source }.into()
            }
        }
    }
}

/// Ordered accumulator for errors collected while walking a build context.
///
/// Formats like a multi-error: a count line followed by one bullet per error.
#[derive(Debug, Default)]
pub struct TraversalErrors {
    errors: Vec<anyhow::Error>,
}

impl TraversalErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: impl Into<anyhow::Error>) {
        self.errors.push(err.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.errors.iter()
    }

    /// Returns `Ok(())` when nothing was collected, otherwise the whole list.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for TraversalErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "1 error occurred:\n\t* {:#}", self.errors[0]),
            n => {
                write!(f, "{n} errors occurred:")?;
                for err in self.iter() {
                    write!(f, "\n\t* {err:#}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for TraversalErrors {}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;
