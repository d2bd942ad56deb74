//! # Pod Manifest Support (`common::kube`)
//!
//! File: cli/src/common/kube/mod.rs
//!
//! ## Overview
//!
//! - **`manifest`**: multi-document YAML splitting, `kind` detection, Pod
//!   decoding and build file lookup.
//! - **`context`**: build-context selection for `podctx play` (which top-level
//!   directories a manifest's images need) and manifest composition.
//!

pub mod context;
pub mod manifest;

pub use self::context::{select_context, SelectedContext, MANIFEST_NAME, MANIFEST_SCRATCH_PREFIX};
