//! # podctx Receiver Utilities
//!
//! File: cli/src/commands/srv/utils.rs
//!
//! ## Overview
//!
//! Filesystem helpers for the receiver's per-request scratch space:
//! - Creating the private `build` directory an archive is extracted into
//! - Finding the sent manifest inside an extracted context
//! - Logging what a request delivered, for debugging
//!
use crate::common::fs::io::list_dir_names;
use crate::common::kube::{MANIFEST_NAME, MANIFEST_SCRATCH_PREFIX};
use crate::core::error::Result;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Creates `path` (a single level) accessible to the current user only.
pub fn create_build_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(path)
        .with_context(|| format!("Failed to create build directory {}", path.display()))
}

/// # Locate Manifest (`locate_manifest`)
///
/// Finds the manifest inside an extracted build context.
///
/// `podctx play` stores the manifest it sends under the absolute path of its
/// scratch directory (for example `tmp/kube1234/play.yaml`), next to whatever
/// the context directory held, which may include an older `play.yaml` of its
/// own. The lookup order is:
///
/// 1. The shallowest `play.yaml` that sits alone in a `kube*` directory below
///    the top level: the manifest that was actually sent.
/// 2. `<build_dir>/play.yaml`, for archives packed without a separate
///    manifest root.
/// 3. The shallowest `play.yaml` anywhere (lexically first on ties).
pub fn locate_manifest(build_dir: &Path) -> Option<PathBuf> {
    let candidates: Vec<walkdir::DirEntry> = WalkDir::new(build_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_NAME)
        .collect();

    let sent = candidates
        .iter()
        .filter(|entry| entry.depth() > 1 && in_manifest_scratch(entry.path()))
        .min_by_key(|entry| entry.depth());
    if let Some(entry) = sent {
        return Some(entry.path().to_path_buf());
    }

    let top = build_dir.join(MANIFEST_NAME);
    if top.is_file() {
        return Some(top);
    }

    candidates
        .into_iter()
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}

/// Whether `manifest` is the only entry of a client-side manifest scratch
/// directory.
fn in_manifest_scratch(manifest: &Path) -> bool {
    let Some(parent) = manifest.parent() else {
        return false;
    };
    let scratch_named = parent
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(MANIFEST_SCRATCH_PREFIX));
    scratch_named && list_dir_names(parent).is_ok_and(|names| names.len() == 1)
}

/// # Log Directory Contents (`log_directory_contents`)
///
/// Logs the immediate entries of `path` at DEBUG level, marking each as a
/// file or a directory.
pub fn log_directory_contents(path: &Path) {
    debug!("Directory contents for {}:", path.display());

    match fs::read_dir(path) {
        Ok(entries) => {
            let mut entry_count = 0;
            for entry in entries.filter_map(|e| e.ok()) {
                entry_count += 1;
                match entry.file_type() {
                    Ok(file_type) => {
                        let kind = if file_type.is_dir() { "DIR " } else { "FILE" };
                        debug!("  - {} : {}", kind, entry.file_name().to_string_lossy());
                    }
                    Err(_) => warn!("  - Could not read type of: {}", entry.path().display()),
                }
            }
            if entry_count == 0 {
                debug!("  (Empty directory)");
            }
        }
        Err(e) => warn!(
            "Could not read directory contents for '{}': {}",
            path.display(),
            e
        ),
    }
}
