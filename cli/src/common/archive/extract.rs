//! # podctx Archive Consumer (`common::archive::extract`)
//!
//! File: cli/src/common/archive/extract.rs
//!
//! ## Overview
//!
//! Unpacks a gzipped tar build context into a destination directory. This is
//! the receiving half of [`build_archive`](super::build_archive) and is used by
//! `podctx extract` and by the `srv` receiver.
//!
//! ## Behavior
//!
//! - The destination is created if missing.
//! - Entries are applied in stream order. Directory entries are collected and
//!   applied last (deepest first), so a read-only directory cannot block the
//!   creation of its own descendants.
//! - Symlinks keep their stored target. Hard links become OS hard links; when
//!   the filesystem refuses, the canonical file is copied instead.
//! - Members whose names would land outside the destination are rejected.
//! - The first failure aborts the extraction. Nothing is aggregated here.
//!
use crate::common::fs::io::ensure_dir_exists;
use crate::core::error::{PodctxError, Result};
use anyhow::Context;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use tokio::io::AsyncRead;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, info, instrument, warn};

/// Extracts the gzipped tar stream `reader` into `destination`.
///
/// # Errors
///
/// Returns the first error encountered: a corrupt or truncated stream, a
/// member escaping `destination`, or any filesystem failure while writing.
#[instrument(skip_all, fields(destination = %destination.display()))]
pub fn extract<R: Read>(reader: R, destination: &Path) -> Result<()> {
    ensure_dir_exists(destination)?;
    let destination = std::path::absolute(destination)
        .with_context(|| format!("Failed to resolve {}", destination.display()))?;

    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_overwrite(true);

    let mut directories = Vec::new();
    let mut count = 0usize;
    for entry in archive.entries().context("Failed to read archive")? {
        let mut entry = entry.context("Failed to read archive entry")?;
        count += 1;
        if entry.header().entry_type() == EntryType::Directory {
            directories.push(entry);
            continue;
        }

        let name = entry.path()?.into_owned();
        let unpacked = entry.unpack_in(&destination);
        match unpacked {
            Ok(true) => {}
            Ok(false) => return Err(escaping_member(&name)),
            Err(e) if entry.header().entry_type() == EntryType::Link => {
                let target = entry
                    .link_name()?
                    .map(|target| target.into_owned())
                    .with_context(|| format!("Hard link {} has no target", name.display()))?;
                warn!(
                    "Could not hard link {} to {} ({}), copying instead",
                    name.display(),
                    target.display(),
                    e
                );
                copy_linked_file(&destination, &name, &target)?;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to unpack {}", name.display())));
            }
        }
    }

    // Deepest first, so parents get their final permissions after their children.
    directories.sort_by(|a, b| b.path_bytes().cmp(&a.path_bytes()));
    for mut entry in directories {
        let name = entry.path()?.into_owned();
        let unpacked = entry
            .unpack_in(&destination)
            .with_context(|| format!("Failed to unpack directory {}", name.display()))?;
        if !unpacked {
            return Err(escaping_member(&name));
        }
    }

    info!("Extracted {} entries into {}", count, destination.display());
    Ok(())
}

/// Async front for [`extract`]: bridges `reader` into a blocking task.
pub async fn extract_stream<R>(reader: R, destination: PathBuf) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let bridge = SyncIoBridge::new(reader);
    tokio::task::spawn_blocking(move || extract(bridge, &destination))
        .await
        .context("Extraction worker failed")?
}

fn escaping_member(name: &Path) -> anyhow::Error {
    PodctxError::FileSystem(format!(
        "archive member {} escapes the destination directory",
        name.display()
    ))
    .into()
}

/// Materializes hard link `name` as a copy of `target`, both relative to
/// `destination`.
fn copy_linked_file(destination: &Path, name: &Path, target: &Path) -> Result<()> {
    let contained = |path: &Path| {
        path.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    };
    if !contained(name) {
        return Err(escaping_member(name));
    }
    if !contained(target) {
        return Err(escaping_member(target));
    }

    let source = destination.join(target);
    let dest = destination.join(name);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(&dest)
            .with_context(|| format!("Failed to replace {}", dest.display()))?;
    }
    fs::copy(&source, &dest).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), dest.display())
    })?;
    debug!("Copied {} to {}", source.display(), dest.display());
    Ok(())
}
