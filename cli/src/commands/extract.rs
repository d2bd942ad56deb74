//! # podctx Extract Command
//!
//! File: cli/src/commands/extract.rs
//!
//! ## Overview
//!
//! Implements `podctx extract`: unpacks a gzipped tar build context, read
//! from a file or stdin, into a destination directory. Stops at the first
//! error.
//!
//! ```bash
//! podctx extract ctx.tar.gz ./out
//! podctx archive ./ctx | podctx extract - ./out
//! ```
//!
use crate::common::archive;
use crate::core::error::Result;
use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// # Extract Arguments (`ExtractArgs`)
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Archive to read, `-` for stdin.
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Directory to extract into (created if missing).
    #[arg(value_name = "DEST")]
    destination: PathBuf,
}

/// # Handle Extract Command (`handle_extract`)
pub async fn handle_extract(args: ExtractArgs) -> Result<()> {
    info!("Handling extract command...");
    debug!("Extract args: {:?}", args);

    if args.archive == Path::new("-") {
        archive::extract_stream(tokio::io::stdin(), args.destination.clone()).await?;
    } else {
        let file = tokio::fs::File::open(&args.archive)
            .await
            .with_context(|| format!("Failed to open archive {}", args.archive.display()))?;
        archive::extract_stream(file, args.destination.clone()).await?;
    }

    println!(
        "✅ Extracted {} into {}",
        args.archive.display(),
        args.destination.display()
    );
    Ok(())
}
