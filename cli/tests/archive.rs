//! # podctx CLI Archive/Extract Integration Tests
//!
//! File: cli/tests/archive.rs
//!
//! ## Overview
//!
//! Runs `podctx archive` and `podctx extract` end to end against temporary
//! directories: archives written to files and stdout, exclusion rules from
//! flags and ignore files, and the error paths a user hits most often.
//!

mod common;
use common::*;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::tempdir;

/// Archives `ctx` into `ctx.tar.gz` and unpacks it into `out`.
#[test]
fn test_archive_then_extract_round_trip() {
    let home = tempdir().unwrap();
    write_file(home.path(), "ctx/Containerfile", "FROM scratch\n");
    write_file(home.path(), "ctx/src/main.sh", "echo hi\n");
    fs::set_permissions(
        home.path().join("ctx/src/main.sh"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();

    podctx_cmd(home.path())
        .args(["archive", "ctx", "-o", "ctx.tar.gz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ctx.tar.gz"));

    podctx_cmd(home.path())
        .args(["extract", "ctx.tar.gz", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted"));

    let out = home.path().join("out");
    assert_eq!(
        fs::read_to_string(out.join("Containerfile")).unwrap(),
        "FROM scratch\n"
    );
    let script = out.join("src/main.sh");
    assert_eq!(fs::read_to_string(&script).unwrap(), "echo hi\n");
    assert_eq!(
        fs::metadata(&script).unwrap().permissions().mode() & 0o777,
        0o755
    );
}

#[test]
fn test_exclude_flags_and_containerignore() {
    let home = tempdir().unwrap();
    write_file(home.path(), "ctx/keep.txt", "keep\n");
    write_file(home.path(), "ctx/debug.log", "noise\n");
    write_file(home.path(), "ctx/important.log", "signal\n");
    write_file(home.path(), "ctx/target/big.bin", "xxxx\n");
    write_file(home.path(), "ctx/.containerignore", "target\n*.log\n");

    podctx_cmd(home.path())
        .args(["archive", "ctx", "-e", "!important.log", "-o", "ctx.tar.gz"])
        .assert()
        .success();
    podctx_cmd(home.path())
        .args(["extract", "ctx.tar.gz", "out"])
        .assert()
        .success();

    let out = home.path().join("out");
    assert!(out.join("keep.txt").is_file());
    assert!(out.join("important.log").is_file());
    assert!(!out.join("debug.log").exists());
    assert!(!out.join("target").exists());
}

#[test]
fn test_archive_to_stdout_is_gzip() {
    let home = tempdir().unwrap();
    write_file(home.path(), "ctx/file.txt", "data\n");

    let output = podctx_cmd(home.path())
        .args(["archive", "ctx"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.len() > 2);
    assert_eq!(&output.stdout[..2], &[0x1f, 0x8b]);
}

#[test]
fn test_extract_from_stdin() {
    let home = tempdir().unwrap();
    write_file(home.path(), "ctx/file.txt", "piped\n");

    let archive = podctx_cmd(home.path())
        .args(["archive", "ctx"])
        .output()
        .unwrap();
    assert!(archive.status.success());

    podctx_cmd(home.path())
        .args(["extract", "-", "out"])
        .write_stdin(archive.stdout)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(home.path().join("out/file.txt")).unwrap(),
        "piped\n"
    );
}

#[test]
fn test_extra_root_must_be_regular_file() {
    let home = tempdir().unwrap();
    write_file(home.path(), "ctx/file.txt", "data\n");
    fs::create_dir(home.path().join("other")).unwrap();
    let other = home.path().join("other");

    podctx_cmd(home.path())
        .args(["archive", "ctx"])
        .arg(&other)
        .args(["-o", "ctx.tar.gz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be a regular file"));
    assert!(!home.path().join("ctx.tar.gz").exists());
}

#[test]
fn test_extra_root_file_lands_under_absolute_name() {
    let home = tempdir().unwrap();
    write_file(home.path(), "ctx/file.txt", "data\n");
    write_file(home.path(), "elsewhere/Containerfile", "FROM alpine\n");
    let extra = home.path().join("elsewhere/Containerfile");

    podctx_cmd(home.path())
        .args(["archive", "ctx"])
        .arg(&extra)
        .args(["-o", "ctx.tar.gz"])
        .assert()
        .success();
    podctx_cmd(home.path())
        .args(["extract", "ctx.tar.gz", "out"])
        .assert()
        .success();

    let relative = extra.strip_prefix("/").unwrap();
    assert_eq!(
        fs::read_to_string(home.path().join("out").join(relative)).unwrap(),
        "FROM alpine\n"
    );
}

#[test]
fn test_invalid_pattern_fails() {
    let home = tempdir().unwrap();
    write_file(home.path(), "ctx/file.txt", "data\n");

    podctx_cmd(home.path())
        .args(["archive", "ctx", "-e", "!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("processing excludes list"));
}

#[test]
fn test_missing_root_fails() {
    let home = tempdir().unwrap();
    podctx_cmd(home.path())
        .args(["archive", "does-not-exist", "-o", "ctx.tar.gz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_extract_rejects_garbage() {
    let home = tempdir().unwrap();
    write_file(home.path(), "garbage.tar.gz", "definitely not gzip");

    podctx_cmd(home.path())
        .args(["extract", "garbage.tar.gz", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
