//! CLI integration tests for firstmark-cli.
//!
//! These tests verify the CLI behavior by running the actual binary
//! and checking outputs, exit codes, and file artifacts.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the firstmark binary.
fn firstmark() -> Command {
    let mut cmd = Command::cargo_bin("firstmark").unwrap();
    cmd.env_remove("FIRSTMARK_REGISTRY").env_remove("RUST_LOG");
    cmd
}

/// Create a registry administered by `root` in `dir`.
fn init_registry(dir: &TempDir) -> std::path::PathBuf {
    let registry = dir.path().join("registry.firstmark");
    firstmark()
        .arg("--registry")
        .arg(&registry)
        .args(["init", "--admin", "root"])
        .assert()
        .success();
    registry
}

fn with_registry(registry: &Path) -> Command {
    let mut cmd = firstmark();
    cmd.arg("--registry").arg(registry);
    cmd
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    firstmark()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("first-registrant ownership"))
        .stdout(predicate::str::contains("fingerprint"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("dispute"));
}

#[test]
fn test_version_displays_version() {
    firstmark()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("firstmark"));
}

#[test]
fn test_help_shows_exit_codes() {
    firstmark()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("67"))
        .stdout(predicate::str::contains("77"));
}

#[test]
fn test_submit_help_shows_options() {
    firstmark()
        .args(["submit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--owner"))
        .stdout(predicate::str::contains("--locator"))
        .stdout(predicate::str::contains("--kind"));
}

#[test]
fn test_dispute_help_lists_subcommands() {
    firstmark()
        .args(["dispute", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("raise"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("list"));
}

// ============================================================================
// Usage Error Tests
// ============================================================================

#[test]
fn test_missing_subcommand_is_usage_error() {
    firstmark().assert().failure().code(64);
}

#[test]
fn test_unknown_kind_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.bin");
    fs::write(&file, b"data").unwrap();

    firstmark()
        .arg("fingerprint")
        .arg(&file)
        .args(["--kind", "hologram"])
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::contains("hologram"));
}

#[test]
fn test_empty_admin_is_usage_error() {
    let dir = TempDir::new().unwrap();
    firstmark()
        .arg("--registry")
        .arg(dir.path().join("r"))
        .args(["init", "--admin", ""])
        .assert()
        .failure()
        .code(64);
}

#[test]
fn test_malformed_exact_hash_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let registry = init_registry(&dir);
    with_registry(&registry)
        .args(["show", "not-a-hash"])
        .assert()
        .failure()
        .code(64);
}

#[test]
fn test_resolve_requires_a_verdict() {
    let dir = TempDir::new().unwrap();
    let registry = init_registry(&dir);
    with_registry(&registry)
        .args(["dispute", "resolve", "1", "--actor", "root"])
        .assert()
        .failure()
        .code(64);
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_registry() {
    let dir = TempDir::new().unwrap();
    let registry = init_registry(&dir);
    assert!(registry.exists());
    assert!(fs::metadata(&registry).unwrap().len() > 0);
}

#[test]
fn test_init_refuses_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    let registry = init_registry(&dir);

    with_registry(&registry)
        .args(["init", "--admin", "other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    with_registry(&registry)
        .args(["init", "--admin", "other", "--force"])
        .assert()
        .success();
}

#[test]
fn test_init_json_format_is_readable_json() {
    let dir = TempDir::new().unwrap();
    let registry = dir.path().join("registry.json");
    with_registry(&registry)
        .args(["--format", "json", "init", "--admin", "root"])
        .assert()
        .success();

    let content = fs::read_to_string(&registry).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(json["admin"], "root");
    assert_eq!(json["version"], 1);
}

#[test]
fn test_registry_from_env_var() {
    let dir = TempDir::new().unwrap();
    let registry = dir.path().join("env.firstmark");
    firstmark()
        .env("FIRSTMARK_REGISTRY", &registry)
        .args(["init", "--admin", "root"])
        .assert()
        .success();
    assert!(registry.exists());
}

// ============================================================================
// Missing Input Tests
// ============================================================================

#[test]
fn test_missing_registry_exit_code() {
    let dir = TempDir::new().unwrap();
    with_registry(&dir.path().join("absent"))
        .arg("stats")
        .assert()
        .failure()
        .code(66)
        .stderr(predicate::str::contains("firstmark init"));
}

#[test]
fn test_missing_media_file_exit_code() {
    let dir = TempDir::new().unwrap();
    firstmark()
        .arg("fingerprint")
        .arg(dir.path().join("nope.png"))
        .assert()
        .failure()
        .code(66);
}

#[test]
fn test_corrupt_registry_is_data_error() {
    let dir = TempDir::new().unwrap();
    let registry = dir.path().join("corrupt");
    fs::write(&registry, b"\x01garbage").unwrap();
    with_registry(&registry)
        .arg("stats")
        .assert()
        .failure()
        .code(65);
}

// ============================================================================
// Fingerprint Tests
// ============================================================================

#[test]
fn test_fingerprint_other_json() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, b"abc").unwrap();

    let output = firstmark()
        .arg("--json")
        .arg("fingerprint")
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // SHA3-256("abc")
    assert_eq!(
        json["exact"],
        "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
    );
    assert!(json["perceptual"].is_null());
    assert!(json["audio"].is_null());
}

#[test]
fn test_fingerprint_empty_file_is_data_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("empty.txt");
    fs::write(&file, b"").unwrap();
    firstmark()
        .arg("fingerprint")
        .arg(&file)
        .assert()
        .failure()
        .code(65);
}

#[test]
fn test_fingerprint_undecodable_image_is_data_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("fake.png");
    fs::write(&file, b"this is not a png").unwrap();
    firstmark()
        .arg("fingerprint")
        .arg(&file)
        .assert()
        .failure()
        .code(65)
        .stderr(predicate::str::contains("Unsupported media"));
}

#[test]
fn test_fingerprint_quiet_prints_nothing() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.txt");
    fs::write(&file, b"hello").unwrap();
    firstmark()
        .args(["--quiet", "fingerprint"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ============================================================================
// Authorization Tests
// ============================================================================

#[test]
fn test_non_admin_role_change_is_unauthorized() {
    let dir = TempDir::new().unwrap();
    let registry = init_registry(&dir);
    with_registry(&registry)
        .args(["role", "add-arbitrator", "mallory", "--actor", "mallory"])
        .assert()
        .failure()
        .code(77)
        .stderr(predicate::str::contains("Unauthorized"));
}

#[test]
fn test_stats_on_fresh_registry() {
    let dir = TempDir::new().unwrap();
    let registry = init_registry(&dir);
    let output = with_registry(&registry)
        .args(["--json", "stats"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total_registered"], 0);
    assert_eq!(json["total_duplicates_detected"], 0);
    assert_eq!(json["total_disputes"], 0);
}
