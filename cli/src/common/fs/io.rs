//! # podctx Filesystem I/O Operations
//!
//! File: cli/src/common/fs/io.rs
//!
//! ## Overview
//!
//! Thin wrappers around `std::fs` that attach path context to errors:
//! - **`ensure_dir_exists`**: `mkdir -p` that refuses to treat a file as a directory.
//!   Used for extraction destinations and scratch parents.
//! - **`read_file_bytes`**: reads manifests and config maps verbatim.
//! - **`list_dir_names`**: immediate (non-recursive) children of a directory, sorted.
//!   Used by context selection to compute the top-level exclusion set.
//!
use crate::core::error::{PodctxError, Result};
use anyhow::Context;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Ensures that a directory exists at the specified path.
///
/// If the path does not exist, the directory is created with all missing
/// parents. If the path exists but is not a directory, a
/// `PodctxError::FileSystem` error is returned.
///
/// # Errors
///
/// Returns an `Err` if:
/// - The path exists but is not a directory.
/// - Creating the directory fails (e.g., due to permissions).
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {:?}", path))?;
        info!("Created directory: {:?}", path);
    } else if !path.is_dir() {
        anyhow::bail!(PodctxError::FileSystem(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    } else {
        debug!("Directory already exists: {:?}", path);
    }
    Ok(())
}

/// Reads the entire content of a file as raw bytes.
pub fn read_file_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Lists the names of the immediate children of `dir`, sorted lexically.
///
/// # Errors
///
/// Returns an `Err` if the directory cannot be opened or an entry cannot be read.
pub fn list_dir_names(dir: &Path) -> Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))? {
        let entry = entry.with_context(|| format!("Failed to read entry in {:?}", dir))?;
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}
