//! # Build Context Selection (`common::kube::context`)
//!
//! File: cli/src/common/kube/context.rs
//!
//! ## Overview
//!
//! Given a pod manifest and a context directory, decides which top-level
//! entries of the directory a remote build actually needs and prepares the
//! archive roots for them.
//!
//! ## Algorithm
//!
//! 1. Split the manifest into documents and keep only `kind: Pod`.
//! 2. For every container image, look for `<context>/<name>/Containerfile`
//!    (or `Dockerfile`). Each hit retains the directory `<name>`.
//! 3. Every other immediate child of the context directory is excluded,
//!    except `play.yaml`, which is always retained.
//! 4. The manifest bytes are written unchanged to `play.yaml` in a fresh
//!    scratch directory, and that file becomes the second archive root.
//!
//! A manifest with no Pods, or whose images are all registry references,
//! excludes every child but `play.yaml`. That is a legitimate outcome.
//!
//! A `play.yaml` already present in the context directory is retained too,
//! so the archive may carry two of them. The one that was sent is the copy
//! under the scratch directory's absolute name, alone in a `kube*` directory.
//!
//! ## Usage
//!
//! ```rust
//! let selected = context::select_context(&manifest, Path::new("./ctx"))?;
//! let stream = selected.into_archive(&ArchiveOptions::default())?;
//! ```
//!
use super::manifest::{self, KIND_POD};
use crate::common::archive::patterns::escape_literal;
use crate::common::archive::tar::spawn_archive;
use crate::common::archive::{ArchiveOptions, ArchiveStream};
use crate::common::fs::io::{list_dir_names, read_file_bytes};
use crate::common::fs::scratch::ScratchDir;
use crate::core::error::{PodctxError, Result};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Name of the rewritten manifest, in the scratch directory and in the archive.
pub const MANIFEST_NAME: &str = "play.yaml";

/// Prefix of the client-side scratch directory holding the manifest. The
/// receiver uses it to tell the sent manifest from a `play.yaml` that was
/// already in the context directory.
pub const MANIFEST_SCRATCH_PREFIX: &str = "kube";

/// Outcome of context selection, ready to be archived.
#[derive(Debug)]
pub struct SelectedContext {
    /// `[context_dir, <scratch>/play.yaml]`.
    pub roots: Vec<PathBuf>,
    /// Literal exclusion patterns, one per excluded child.
    pub excludes: Vec<String>,
    /// Retained child names, `play.yaml` first.
    pub retained: Vec<String>,
    /// Excluded child names, sorted.
    pub excluded: Vec<String>,
    scratch: ScratchDir,
}

impl SelectedContext {
    /// Path of the manifest copy that will be archived.
    pub fn manifest_path(&self) -> &Path {
        &self.roots[1]
    }

    /// Starts archiving the selected context.
    ///
    /// The scratch directory moves into the archive worker and is removed as
    /// soon as the worker finishes, whether the stream was read to the end,
    /// closed early or dropped.
    pub fn into_archive(self, options: &ArchiveOptions) -> Result<ArchiveStream> {
        spawn_archive(&self.excludes, &self.roots, options, Some(self.scratch))
    }
}

/// Selects the minimal build context for `raw_manifest` inside `context_dir`.
///
/// # Errors
///
/// - `PodctxError::ManifestDecode` if the manifest cannot be split or a
///   document has no readable `kind`.
/// - `PodctxError::PodDecode` if a `Pod` document has an unexpected shape.
/// - Filesystem errors while probing build files, listing `context_dir` or
///   writing the manifest copy.
#[instrument(skip_all, fields(context_dir = %context_dir.display()))]
pub fn select_context(raw_manifest: &[u8], context_dir: &Path) -> Result<SelectedContext> {
    let documents = manifest::split_documents(raw_manifest)?;
    let children = list_dir_names(context_dir)?;

    let mut retained = vec![MANIFEST_NAME.to_string()];
    for document in &documents {
        let kind = manifest::document_kind(document)?;
        if kind != KIND_POD {
            debug!("Ignoring document of kind '{}'", kind);
            continue;
        }

        let pod = manifest::decode_pod(document)?;
        for image in pod.spec.containers.iter().filter_map(|c| c.image.as_deref()) {
            if manifest::resolve_build_file(image, context_dir)?.is_none() {
                continue;
            }
            let dir = manifest::build_dir_name(image).to_string();
            if !retained.contains(&dir) {
                info!("Retaining build directory '{}' for image {}", dir, image);
                retained.push(dir);
            }
        }
    }

    let excluded: Vec<String> = children
        .iter()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !retained.contains(name))
        .collect();
    let excludes = excluded.iter().map(|name| escape_literal(name)).collect();
    info!(
        "Context selection retained {:?}, excluded {} entr(ies)",
        retained,
        excluded.len()
    );

    let scratch = ScratchDir::new(MANIFEST_SCRATCH_PREFIX, None)?;
    let manifest_path = scratch.path().join(MANIFEST_NAME);
    fs::write(&manifest_path, raw_manifest)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    Ok(SelectedContext {
        roots: vec![context_dir.to_path_buf(), manifest_path],
        excludes,
        retained,
        excluded,
        scratch,
    })
}

/// Appends config-map files to a manifest, each as its own YAML document.
pub fn compose_manifest(body: Vec<u8>, config_maps: &[PathBuf]) -> Result<Vec<u8>> {
    let mut manifest = body;
    for config_map in config_maps {
        manifest.extend_from_slice(b"---\n");
        manifest.extend(read_file_bytes(config_map)?);
        manifest.push(b'\n');
    }
    Ok(manifest)
}

/// Rejects a build request that has no context directory to build from.
pub fn require_context_dir(build: bool, context_dir: Option<&Path>) -> Result<()> {
    if build && context_dir.is_none() {
        return Err(PodctxError::ArgumentParsing(
            "build option may be specified only with context-dir".to_string(),
        )
        .into());
    }
    Ok(())
}
