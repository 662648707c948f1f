//! CLI integration tests for migrate and migrate-help.
//!
//! These tests verify argument parsing, help output, output files
//! and exit codes for the error conditions that need no live project.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Nothing listens on port 1, so connections fail immediately.
const DEAD_SOURCE: &str = "--source-url=http://127.0.0.1:1";
const DEAD_TARGET: &str = "--target-url=http://127.0.0.1:2";

fn migrate() -> Command {
    Command::cargo_bin("migrate").unwrap()
}

fn migrate_help() -> Command {
    Command::cargo_bin("migrate-help").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_lists_flags() {
    migrate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--source-url"))
        .stdout(predicate::str::contains("--target-service-key"))
        .stdout(predicate::str::contains("--include-storage"))
        .stdout(predicate::str::contains("--schema-only"))
        .stdout(predicate::str::contains("--data-only"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--output-dir"));
}

#[test]
fn test_version_flag() {
    migrate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_migrate_help_prints_guide() {
    let dir = TempDir::new().unwrap();
    migrate_help()
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("--schema-only"))
        .stdout(predicate::str::contains("schema.sql"))
        .stdout(predicate::str::contains("Exit codes"));

    // No side effects.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_migrate_help_accepts_help_flag() {
    migrate_help()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("migrate-help"));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_no_flags_lists_every_missing_value() {
    migrate()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("source url is required"))
        .stderr(predicate::str::contains("source key is required"))
        .stderr(predicate::str::contains("target url is required"));
}

#[test]
fn test_schema_only_and_data_only_conflict() {
    migrate()
        .args([DEAD_SOURCE, "--source-key=anon", "--schema-only", "--data-only"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot be combined"));
}

#[test]
fn test_zero_batch_size_rejected() {
    migrate()
        .args([DEAD_SOURCE, "--source-key=anon", "--schema-only", "--batch-size=0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("batch size must be at least 1"));
}

#[test]
fn test_storage_requires_service_keys() {
    migrate()
        .args([
            DEAD_SOURCE,
            "--source-key=anon",
            DEAD_TARGET,
            "--target-key=anon",
            "--include-storage",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("source service key is required"))
        .stderr(predicate::str::contains("target service key is required"));
}

#[test]
fn test_resume_requires_state_file() {
    migrate()
        .args([DEAD_SOURCE, "--source-key=anon", "--schema-only", "--resume"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--resume requires --state-file"));
}

#[test]
fn test_invalid_url_rejected_before_network() {
    migrate()
        .args(["--source-url=old.example.co", "--source-key=anon", "--schema-only"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("must start with http:// or https://"));
}

#[test]
fn test_bool_flag_accepts_explicit_value() {
    let dir = TempDir::new().unwrap();
    // --data-only=false with --schema-only=true is a plain schema-only run.
    migrate()
        .args([DEAD_SOURCE, "--source-key=anon", "--schema-only=true", "--data-only=false"])
        .arg(format!("--output-dir={}", dir.path().display()))
        .assert()
        .success();
}

// =============================================================================
// Run Tests
// =============================================================================

#[test]
fn test_schema_only_writes_schema_without_network() {
    let dir = TempDir::new().unwrap();
    migrate()
        .args([DEAD_SOURCE, "--source-key=anon", "--schema-only"])
        .arg(format!("--output-dir={}", dir.path().display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Migration completed!"));

    let schema = std::fs::read_to_string(dir.path().join("schema.sql")).unwrap();
    assert!(schema.contains("CREATE TABLE IF NOT EXISTS public.properties"));
    assert!(!dir.path().join("data.json").exists());
}

#[test]
fn test_schema_only_json_output() {
    let dir = TempDir::new().unwrap();
    let output = migrate()
        .args([DEAD_SOURCE, "--source-key=anon", "--schema-only", "--output-json"])
        .arg(format!("--output-dir={}", dir.path().display()))
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "completed");
    assert!(report["run_id"].is_string());
}

#[test]
fn test_unreachable_projects_exit_with_connectivity_code() {
    let dir = TempDir::new().unwrap();
    migrate()
        .args([DEAD_SOURCE, "--source-key=anon", DEAD_TARGET, "--target-key=anon"])
        .arg(format!("--output-dir={}", dir.path().display()))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Connectivity check failed"));

    assert!(!dir.path().join("data.json").exists());
}

#[test]
fn test_state_file_written_on_failure() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("run.state.json");
    migrate()
        .args([DEAD_SOURCE, "--source-key=anon", DEAD_TARGET, "--target-key=anon"])
        .arg(format!("--output-dir={}", dir.path().display()))
        .arg(format!("--state-file={}", state.display()))
        .assert()
        .failure()
        .code(2);

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(saved["status"], "failed");
    assert_eq!(saved["steps"][0]["step"], "connectivity");
    assert_eq!(saved["steps"][0]["status"], "error");
}
