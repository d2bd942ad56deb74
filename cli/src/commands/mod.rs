//! # podctx Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates all top-level subcommands of the podctx CLI. Each
//! subcommand module defines a clap `Args` struct and an async `handle_*`
//! function that `main.rs` dispatches to.
//!
//! ## Commands
//!
//! - `archive`: pack a build context into a gzipped tar stream
//! - `extract`: unpack such a stream into a directory
//! - `play`: select and pack the minimal build context of a pod manifest
//! - `srv`: HTTP receiver for build contexts
//!

/// Packs source roots into a build-context archive.
pub mod archive;
/// Unpacks a build-context archive.
pub mod extract;
/// Output helpers shared by archive-producing commands.
mod output;
/// Selects and packs the build context of a pod manifest.
pub mod play;
/// Build-context HTTP receiver. Includes configuration and server logic.
pub mod srv;
