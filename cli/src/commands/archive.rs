//! # podctx Archive Command
//!
//! File: cli/src/commands/archive.rs
//!
//! ## Overview
//!
//! Implements `podctx archive`: packs a build context into a gzipped tar
//! stream, written to a file or to stdout.
//!
//! ## Architecture
//!
//! 1. Load the podctx configuration (compression level, pipe capacity,
//!    default exclusions).
//! 2. Gather exclusion patterns: config defaults, then the ignore file
//!    (`--ignorefile`, or `.containerignore`/`.dockerignore` in the first
//!    root), then `-e` flags. Later rules win.
//! 3. Start the archive producer and drain it into the output.
//!
//! ## Examples
//!
//! ```bash
//! # Archive ./ctx to stdout
//! podctx archive ./ctx > ctx.tar.gz
//!
//! # Add an out-of-tree Containerfile and skip logs
//! podctx archive ./ctx /abs/path/Containerfile -e '*.log' -o ctx.tar.gz
//! ```
//!
use super::output::{self, Target};
use crate::common::archive::{self, patterns};
use crate::core::config;
use crate::core::error::Result;
use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Ignore files looked up in the context root, in order.
const IGNORE_FILES: [&str; 2] = [".containerignore", ".dockerignore"];

/// # Archive Arguments (`ArchiveArgs`)
#[derive(Parser, Debug)]
pub struct ArchiveArgs {
    /// Source roots. The first is the context directory; any further root must
    /// be a regular file and is stored under its absolute path.
    #[arg(required = true, value_name = "ROOT")]
    roots: Vec<PathBuf>,

    /// Exclusion pattern, may be repeated. Prefix with `!` to re-include.
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    excludes: Vec<String>,

    /// Ignore file to use instead of `<ROOT>/.containerignore` or `.dockerignore`.
    #[arg(long, value_name = "FILE")]
    ignorefile: Option<PathBuf>,

    /// Output file, `-` for stdout (default).
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

/// # Handle Archive Command (`handle_archive`)
pub async fn handle_archive(args: ArchiveArgs) -> Result<()> {
    info!("Handling archive command...");
    debug!("Archive args: {:?}", args);

    let cfg = config::load_config().context("Failed to load podctx configuration")?;

    let mut excludes = cfg.archive.default_excludes.clone();
    excludes.extend(ignore_patterns(args.ignorefile.as_deref(), &args.roots[0])?);
    excludes.extend(args.excludes.iter().cloned());
    debug!("Effective exclusion patterns: {:?}", excludes);

    let stream = archive::build_archive(&excludes, &args.roots, &cfg.archive.options())?;
    let target = Target::from_arg(args.output.as_deref());
    let written = output::write_archive(stream, target).await?;

    if let Target::File(path) = target {
        println!("✅ Wrote {} bytes to {}", written, path.display());
    }
    Ok(())
}

/// Reads the exclusion rules from `explicit`, or from the first ignore file
/// found in `context_root`. A missing default ignore file is not an error.
fn ignore_patterns(explicit: Option<&Path>, context_root: &Path) -> Result<Vec<String>> {
    if let Some(path) = explicit {
        return patterns::read_ignore_file(path);
    }
    for name in IGNORE_FILES {
        let candidate = context_root.join(name);
        if candidate.is_file() {
            info!("Using ignore file {}", candidate.display());
            return patterns::read_ignore_file(&candidate);
        }
    }
    Ok(Vec::new())
}
