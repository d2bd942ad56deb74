//! # podctx Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! This file serves as the main entry point for the podctx CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to appropriate command handlers
//!
//! ## Architecture
//!
//! - Each top-level command (`archive`, `extract`, `play`, `srv`) is a variant
//!   of the `Commands` enum
//! - Commands are mapped to handler functions in their respective modules
//! - All errors are propagated to this level for consistent handling
//!
//! ## Examples
//!
//! ```bash
//! # Get help
//! podctx --help
//!
//! # Pack the build context of a pod manifest, with debug logs
//! podctx -vv play pod.yaml --context-dir ./ctx -o ctx.tar.gz
//! ```
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands; // Subcommand argument structs and handlers
mod common; // Archive, filesystem and manifest building blocks
mod core; // Errors and configuration

/// Top-level command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "podctx",
    about = "📦 podctx: minimal build contexts for pod manifests",
    long_about = "Pack, unpack and receive the minimal build context a pod manifest needs.\n\
                  Only the directories that container images are built from are sent.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// All available top-level commands.
#[derive(Parser, Debug)]
enum Commands {
    /// Pack source roots into a gzipped tar build context.
    #[command(alias = "a")]
    Archive(commands::archive::ArchiveArgs),
    /// Unpack a gzipped tar build context.
    #[command(alias = "x")]
    Extract(commands::extract::ExtractArgs),
    /// Select and pack the build context of a pod manifest.
    #[command(alias = "p")]
    Play(commands::play::PlayArgs),
    /// Run an HTTP receiver for build contexts.
    Srv(commands::srv::SrvArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Archive(args) => commands::archive::handle_archive(args).await,
        Commands::Extract(args) => commands::extract::handle_extract(args).await,
        Commands::Play(args) => commands::play::handle_play(args).await,
        Commands::Srv(args) => commands::srv::handle_srv(args).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
