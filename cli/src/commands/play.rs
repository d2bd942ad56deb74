//! # podctx Play Command
//!
//! File: cli/src/commands/play.rs
//!
//! ## Overview
//!
//! Implements `podctx play`: prepares what a pod manifest needs to be built
//! remotely. With a context directory, it selects the directories that the
//! manifest's images are built from, and emits a gzipped tar stream holding
//! them plus the manifest (`application/x-tar` body). Without one, it emits
//! the composed manifest itself (`application/json` body).
//!
//! ## Architecture
//!
//! 1. Read the manifest and append every `--configmap` file as an extra
//!    YAML document.
//! 2. Refuse `--build` without `--context-dir`.
//! 3. Select the context (`common::kube::select_context`): a top-level entry
//!    of the context directory is kept only if an image is built from it.
//! 4. `--dry-run` prints the selection; otherwise the archive is streamed to
//!    the output.
//!
//! ## Examples
//!
//! ```bash
//! # See which directories would be sent
//! podctx play pod.yaml --context-dir ./ctx --dry-run
//!
//! # Write the build context for pod.yaml and its config map
//! podctx play pod.yaml --context-dir ./ctx --configmap cm.yaml -o ctx.tar.gz
//! ```
//!
use super::output::{self, Target};
use crate::common::fs::io::read_file_bytes;
use crate::common::kube::context::{compose_manifest, require_context_dir};
use crate::common::kube::select_context;
use crate::core::config;
use crate::core::error::Result;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

/// # Play Arguments (`PlayArgs`)
#[derive(Parser, Debug)]
pub struct PlayArgs {
    /// Pod manifest (multi-document YAML).
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    /// Directory holding one sub-directory per locally built image.
    #[arg(long, value_name = "DIR")]
    context_dir: Option<PathBuf>,

    /// Build images from the context directory (implied by --context-dir).
    #[arg(long)]
    build: bool,

    /// Config map file appended to the manifest, may be repeated.
    #[arg(long = "configmap", value_name = "FILE")]
    config_maps: Vec<PathBuf>,

    /// Output file, `-` for stdout (default).
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the context selection instead of producing the archive.
    #[arg(long)]
    dry_run: bool,
}

/// # Handle Play Command (`handle_play`)
pub async fn handle_play(args: PlayArgs) -> Result<()> {
    info!("Handling play command...");
    debug!("Play args: {:?}", args);

    let build = args.build || args.context_dir.is_some();
    require_context_dir(build, args.context_dir.as_deref())?;

    let body = read_file_bytes(&args.manifest)?;
    let manifest = compose_manifest(body, &args.config_maps)?;
    let target = Target::from_arg(args.output.as_deref());

    let Some(context_dir) = args.context_dir.as_deref() else {
        if args.dry_run {
            println!("No context directory: the manifest would be sent as is.");
            return Ok(());
        }
        return output::write_bytes(&manifest, target).await;
    };

    let selected = select_context(&manifest, context_dir)
        .with_context(|| format!("Failed to select build context in {}", context_dir.display()))?;

    if args.dry_run {
        println!("Context directory: {}", context_dir.display());
        println!("Retained: {}", selected.retained.join(", "));
        if selected.excluded.is_empty() {
            println!("Excluded: (none)");
        } else {
            println!("Excluded: {}", selected.excluded.join(", "));
        }
        return Ok(());
    }

    let cfg = config::load_config().context("Failed to load podctx configuration")?;
    let stream = selected.into_archive(&cfg.archive.options())?;
    let written = output::write_archive(stream, target).await?;

    if let Target::File(path) = target {
        println!("✅ Wrote {} bytes of build context to {}", written, path.display());
    }
    Ok(())
}
