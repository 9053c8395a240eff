//! Integration tests for the CLI binary.
//!
//! This test is registered as a [[test]] in the identity-gateway-cli crate
//! so that CARGO_BIN_EXE_igw is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `igw` binary, with a private data directory
/// and cheap key derivation.
fn igw(data_dir: &Path, seed: &str) -> Command {
    let config = data_dir.join("igw.json");
    if !config.exists() {
        std::fs::write(&config, r#"{"kdf": {"m_cost": 8, "t_cost": 1, "p_cost": 1}}"#)
            .expect("failed to write config");
    }
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_igw"));
    cmd.arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(data_dir)
        .env("IGW_SEED_PHRASE", seed)
        .env_remove("IGW_DATA_DIR")
        .env_remove("IGW_PUBLIC_BASE_URL");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    let output = cmd.output().expect("failed to execute igw");
    assert!(
        output.status.success(),
        "igw should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_igw"))
        .arg("--help")
        .output()
        .expect("failed to execute igw --help");
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage"));
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_igw"))
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute igw");
    assert!(!output.status.success());
}

#[test]
fn cli_identity_and_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();

    let created = run(igw(data, "alice seed").args(["identity", "create", "alice"]));
    assert!(stdout(&created).contains("http://localhost:5678/alice"));

    run(igw(data, "alice seed").args(["attr", "set", "alice", "email", "primary", "x@y.com"]));
    let got = run(igw(data, "alice seed").args(["attr", "get", "alice", "email", "primary"]));
    assert_eq!(stdout(&got).trim(), "x@y.com");

    let types = run(igw(data, "alice seed").args(["attr", "list", "alice"]));
    assert_eq!(stdout(&types).trim(), "email");

    // Wrong seed phrase is refused.
    let denied = igw(data, "mallory seed")
        .args(["attr", "get", "alice", "email", "primary"])
        .output()
        .unwrap();
    assert!(!denied.status.success());
}

#[test]
fn cli_grant_check_revoke() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    let bob = "http://localhost:5678/bob";

    run(igw(data, "alice seed").args(["identity", "create", "alice"]));
    run(igw(data, "alice seed").args([
        "access", "grant", "alice", "--identity", bob, "--path", "/identity/email/primary", "--read",
    ]));

    let check = run(igw(data, "alice seed").args([
        "access", "check", "alice", "--requester", bob, "--path", "/identity/email/primary",
    ]));
    assert_eq!(stdout(&check).trim(), "read=true write=false");

    let revoked = run(igw(data, "alice seed").args([
        "access", "revoke", "alice", "--identity", bob, "--path", "/identity/email/primary",
    ]));
    assert!(stdout(&revoked).contains("Deleted 1 rule(s)"));

    let check = run(igw(data, "alice seed").args([
        "access", "check", "alice", "--requester", bob, "--path", "/identity/email/primary",
    ]));
    assert_eq!(stdout(&check).trim(), "read=false write=false");
}

#[test]
fn cli_verify_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    let alice = "http://localhost:5678/alice";
    let bob = "http://localhost:5678/bob";

    run(igw(data, "alice seed").args(["identity", "create", "alice"]));
    run(igw(data, "bob seed").args(["identity", "create", "bob"]));
    run(igw(data, "alice seed").args(["attr", "set", "alice", "email", "primary", "x@y.com"]));
    run(igw(data, "alice seed").args([
        "access", "grant", "alice", "--identity", bob, "--path", "/identity/email/primary*", "--read",
        "--write",
    ]));

    let verified = run(igw(data, "bob seed").args([
        "verify", "--as", "bob", alice, "email", "primary", "x@y.com",
    ]));
    assert!(stdout(&verified).contains("Stored verification #1"));

    let checked = run(igw(data, "alice seed").args([
        "check", "--as", "alice", alice, "email", "primary", "x@y.com",
    ]));
    let out = stdout(&checked);
    assert!(out.contains(bob));
    assert!(out.contains("valid"));
    assert!(!out.contains("INVALID"));

    let mismatch = igw(data, "bob seed")
        .args(["verify", "--as", "bob", alice, "email", "primary", "other@y.com"])
        .output()
        .unwrap();
    assert!(!mismatch.status.success());
    assert!(String::from_utf8_lossy(&mismatch.stderr).contains("mismatch"));
}
