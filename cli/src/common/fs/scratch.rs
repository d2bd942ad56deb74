//! # podctx Scratch Directories
//!
//! File: cli/src/common/fs/scratch.rs
//!
//! ## Overview
//!
//! Every request that needs temporary disk space (the rewritten `play.yaml` on
//! the client side, the extracted build context on the receiver side) gets its
//! own [`ScratchDir`]. The guard removes the directory when it is dropped or
//! explicitly closed. Removal is best effort: failures are logged at `warn`
//! and never propagated, so teardown can never mask the request's own result.
//!
use crate::core::error::Result;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::io::ensure_dir_exists;

/// Owned temporary directory with logged, best-effort removal.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Creates a scratch directory named `<prefix>XXXXXX` under `parent`,
    /// or under the system temp directory when `parent` is `None`.
    pub fn new(prefix: &str, parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match parent {
            Some(parent) => {
                ensure_dir_exists(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .with_context(|| format!("Failed to create scratch directory with prefix '{prefix}'"))?;

        let path = dir.path().to_path_buf();
        debug!("Created scratch directory {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory now. Equivalent to dropping the guard.
    pub fn close(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => debug!("Removed scratch directory {}", self.path.display()),
            Err(e) => warn!(
                "failed to remove build scratch directory {:?}: {}",
                self.path, e
            ),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.remove();
    }
}
