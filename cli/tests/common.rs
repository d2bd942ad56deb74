//! # podctx CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration test crates in `cli/tests/`. Every
//! command built here runs with its home and config directories pointed at a
//! throwaway location, so a developer's own `~/.config/podctx/config.toml`
//! never leaks into test results.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::path::Path;

/// # Get podctx Command (`podctx_cmd`)
///
/// Returns a command for the compiled `podctx` binary, isolated from user
/// configuration. `home` doubles as the working directory.
pub fn podctx_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("podctx").expect("Failed to find podctx binary for testing");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

/// Writes `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    fs::write(&path, contents).expect("Failed to write test file");
}

/// A two-container pod: `source2` is built locally, `nginx:latest` is pulled.
pub const POD_MANIFEST: &str = r#"apiVersion: v1
kind: Pod
metadata:
  name: web
spec:
  containers:
    - name: app
      image: localhost/source2:latest
    - name: proxy
      image: docker.io/library/nginx:latest
"#;

/// Lays out a context directory with two image sources, only `source2`
/// having a Containerfile.
pub fn pod_context(root: &Path) {
    write_file(root, "ctx/source1/Containerfile", "FROM scratch\n");
    write_file(root, "ctx/source1/data.txt", "one\n");
    write_file(root, "ctx/source2/Containerfile", "FROM alpine\nCOPY app.sh /\n");
    write_file(root, "ctx/source2/app.sh", "#!/bin/sh\necho hi\n");
    write_file(root, "pod.yaml", POD_MANIFEST);
}
