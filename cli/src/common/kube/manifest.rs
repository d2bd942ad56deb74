//! # Pod Manifest Decoding (`common::kube::manifest`)
//!
//! File: cli/src/common/kube/manifest.rs
//!
//! ## Overview
//!
//! Only a sliver of the Kubernetes object model matters for build-context
//! selection: the `kind` of each document and, for Pods, the image of every
//! container. Everything else in a manifest is ignored here and passed on
//! verbatim.
//!
//! ## Build file lookup
//!
//! A container image `registry:5000/team/web:1.2` is built locally when the
//! context directory holds `web/Containerfile` (or `web/Dockerfile`). The
//! build directory name is the image's last path segment without tag or
//! digest.
//!
use crate::core::error::{PodctxError, Result};
use anyhow::anyhow;
use serde::Deserialize;
use serde_yaml::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Kind of the documents that are inspected for build references.
pub const KIND_POD: &str = "Pod";

/// Build file names, in lookup order.
pub const BUILD_FILES: [&str; 2] = ["Containerfile", "Dockerfile"];

#[derive(Debug, Deserialize)]
struct KindEnvelope {
    #[serde(default)]
    kind: Option<String>,
}

/// The subset of a Pod that podctx reads.
#[derive(Debug, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Splits a multi-document YAML stream, dropping empty documents.
///
/// # Errors
///
/// `PodctxError::ManifestDecode` when the stream is not valid YAML.
pub fn split_documents(raw: &[u8]) -> std::result::Result<Vec<Value>, PodctxError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_slice(raw) {
        let value =
            Value::deserialize(document).map_err(|e| PodctxError::ManifestDecode(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        documents.push(value);
    }
    debug!("Split manifest into {} document(s)", documents.len());
    Ok(documents)
}

/// Reads the `kind` of one document. A document without `kind` has kind `""`.
pub fn document_kind(document: &Value) -> std::result::Result<String, PodctxError> {
    if !document.is_mapping() {
        return Err(PodctxError::ManifestDecode(
            "document is not a mapping".to_string(),
        ));
    }
    let envelope =
        KindEnvelope::deserialize(document).map_err(|e| PodctxError::ManifestDecode(e.to_string()))?;
    Ok(envelope.kind.unwrap_or_default())
}

/// Decodes a `Pod` document.
pub fn decode_pod(document: &Value) -> std::result::Result<Pod, PodctxError> {
    Pod::deserialize(document).map_err(|e| PodctxError::PodDecode(e.to_string()))
}

/// Build directory name for `image`: last `/` segment, without `@digest`
/// and `:tag`.
pub fn build_dir_name(image: &str) -> &str {
    let last = image.rsplit('/').next().unwrap_or(image);
    let last = last.split_once('@').map_or(last, |(name, _)| name);
    last.split_once(':').map_or(last, |(name, _)| name)
}

/// Looks for the build file of `image` inside `context_dir`.
///
/// Returns `Ok(None)` when neither `Containerfile` nor `Dockerfile` exists,
/// meaning the image is pulled from a registry rather than built.
///
/// # Errors
///
/// A stat failure other than "not found" on the last candidate. A failure
/// on `Containerfile` is logged and `Dockerfile` is still tried.
pub fn resolve_build_file(image: &str, context_dir: &Path) -> Result<Option<PathBuf>> {
    let name = build_dir_name(image);
    if matches!(name, "" | "." | "..") {
        return Ok(None);
    }

    let mut last_error: Option<(PathBuf, io::Error)> = None;
    for candidate in BUILD_FILES {
        let path = context_dir.join(name).join(candidate);
        match fs::metadata(&path) {
            Ok(_) => {
                debug!("Building {} with {}", image, path.display());
                return Ok(Some(path));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => last_error = None,
            Err(e) => {
                error!("Cannot stat {}: {}", path.display(), e);
                last_error = Some((path, e));
            }
        }
    }

    match last_error {
        None => Ok(None),
        Some((path, e)) => Err(anyhow!(e).context(format!("checking build file {}", path.display()))),
    }
}
