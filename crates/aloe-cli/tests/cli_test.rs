//! CLI integration tests using assert_cmd
//!
//! These tests verify the CLI commands work correctly end-to-end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command instance for the aloe binary bound to a data directory
fn aloe_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("aloe").expect("Failed to find aloe binary");
    cmd.env_remove("ALOE_DATA_DIR")
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data_dir.path());
    cmd
}

fn create_version(data_dir: &TempDir, description: &str) {
    aloe_cmd(data_dir)
        .args(["version", "create", "-d", description, "-c", "test change"])
        .assert()
        .success();
}

#[test]
fn test_help_command() {
    Command::cargo_bin("aloe")
        .expect("Failed to find aloe binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Aloe Location - version history and backups",
        ));
}

#[test]
fn test_version_command() {
    Command::cargo_bin("aloe")
        .expect("Failed to find aloe binary")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("aloe"));
}

#[test]
fn test_version_help() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    aloe_cmd(&dir)
        .args(["version", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restore the data of a version"));
}

#[test]
fn test_version_list_empty() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    aloe_cmd(&dir)
        .args(["version", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No versions found"));
}

#[test]
fn test_version_create_and_list() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    aloe_cmd(&dir)
        .args(["version", "create", "-d", "Version initiale", "-a", "admin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created version 1.0.0"));

    aloe_cmd(&dir)
        .args(["version", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0"))
        .stdout(predicate::str::contains("Version initiale"))
        .stdout(predicate::str::contains("admin"));

    assert!(dir.path().join("aloe.db").exists());
}

#[test]
fn test_version_list_json() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "first");
    create_version(&dir, "second");

    let output = aloe_cmd(&dir)
        .args(["version", "list", "--json"])
        .output()
        .expect("Failed to run list");
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("Invalid JSON");
    let rows = rows.as_array().expect("Expected an array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["version"], "1.0.1");
    assert_eq!(rows[1]["changes"][0], "test change");
}

#[test]
fn test_version_show_not_found() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    aloe_cmd(&dir)
        .args(["version", "show", "9.9.9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Version not found: 9.9.9"));
}

#[test]
fn test_version_show_details() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "Création vente");

    aloe_cmd(&dir)
        .args(["version", "show", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Description: Création vente"))
        .stdout(predicate::str::contains("Author: System"))
        .stdout(predicate::str::contains("- test change"));
}

#[test]
fn test_version_delete_force() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "to delete");

    aloe_cmd(&dir)
        .args(["version", "delete", "1.0.0", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted version 1.0.0"));

    aloe_cmd(&dir)
        .args(["version", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No versions found"));
}

#[test]
fn test_version_delete_cancelled() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "kept");

    aloe_cmd(&dir)
        .args(["version", "delete", "1.0.0"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled"));

    aloe_cmd(&dir)
        .args(["version", "show", "1.0.0"])
        .assert()
        .success();
}

#[test]
fn test_version_restore_creates_safety_version() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "first");
    create_version(&dir, "second");

    aloe_cmd(&dir)
        .args(["version", "restore", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored version 1.0.0"))
        .stdout(predicate::str::contains("Safety version created: 1.0.2"))
        .stdout(predicate::str::contains("Reload the application"));

    aloe_cmd(&dir)
        .args(["version", "show", "1.0.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Sauvegarde avant restauration vers 1.0.0",
        ));
}

#[test]
fn test_version_restore_unknown_label() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    aloe_cmd(&dir)
        .args(["version", "restore", "1.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Version not found"));
}

#[test]
fn test_version_diff_identical_data() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "first");
    create_version(&dir, "second");

    aloe_cmd(&dir)
        .args(["version", "diff", "1.0.0", "1.0.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0 -> 1.0.1: no differences"));
}

#[test]
fn test_export_and_import_between_data_dirs() {
    let source = TempDir::new().expect("Failed to create temp dir");
    let target = TempDir::new().expect("Failed to create temp dir");
    let export_dir = TempDir::new().expect("Failed to create temp dir");
    let export_path = export_dir.path().join("history.json");

    create_version(&source, "exported");

    aloe_cmd(&source)
        .arg("export")
        .arg("-o")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported version history"));

    let content = fs::read_to_string(&export_path).expect("Export file missing");
    let document: serde_json::Value = serde_json::from_str(&content).expect("Invalid JSON");
    assert_eq!(document["appName"], "Aloe Location");

    aloe_cmd(&target)
        .arg("import")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 version(s)"));

    aloe_cmd(&target)
        .args(["version", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exported"))
        .stdout(predicate::str::contains("Sauvegarde avant import"));
}

#[test]
fn test_export_to_stdout() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "first");

    let output = aloe_cmd(&dir).arg("export").output().expect("Failed to export");
    assert!(output.status.success());

    let document: serde_json::Value = serde_json::from_slice(&output.stdout).expect("Invalid JSON");
    assert_eq!(document["versions"].as_array().map(Vec::len), Some(1));
    assert_eq!(document["metadata"]["totalVersions"], 1);
}

#[test]
fn test_import_malformed_file_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = dir.path().join("broken.json");
    fs::write(&file, r#"{"metadata": {}}"#).expect("Failed to write file");

    aloe_cmd(&dir)
        .arg("import")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid import data"));
}

#[test]
fn test_check_and_repair_clean_store() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "first");

    aloe_cmd(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Integrity check passed"));

    aloe_cmd(&dir)
        .arg("repair")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version data is valid"));
}

#[test]
fn test_cleanup_keeps_newest() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for description in ["a", "b", "c"] {
        create_version(&dir, description);
    }

    aloe_cmd(&dir)
        .args(["cleanup", "--keep", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 2 old version(s)"));
}

#[test]
fn test_retention_rejects_zero() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    aloe_cmd(&dir)
        .args(["retention", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));

    aloe_cmd(&dir)
        .args(["retention", "25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Retention set to 25"));
}

#[test]
fn test_config_file_sets_retention_cap() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("config.toml"), "max_versions = 2\n").expect("Failed to write config");

    for description in ["a", "b", "c"] {
        create_version(&dir, description);
    }

    let output = aloe_cmd(&dir)
        .args(["version", "list", "--json"])
        .output()
        .expect("Failed to run list");
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("Invalid JSON");
    assert_eq!(rows.as_array().map(Vec::len), Some(2));
}

#[test]
fn test_auto_backup_settings_and_status() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    aloe_cmd(&dir)
        .args(["auto-backup", "on", "--interval", "15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("every 15 minute(s)"));

    aloe_cmd(&dir)
        .args(["auto-backup", "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Auto-backup disabled"));

    let output = aloe_cmd(&dir)
        .args(["status", "--json"])
        .output()
        .expect("Failed to run status");
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).expect("Invalid JSON");
    assert_eq!(status["metadata"]["autoBackupEnabled"], false);
    assert_eq!(status["metadata"]["backupInterval"], 15);
    assert!(status["currentVersion"].is_null());
}

#[test]
fn test_auto_backup_rejects_zero_interval() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    aloe_cmd(&dir)
        .args(["auto-backup", "on", "--interval", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("backup interval"));
}

#[test]
fn test_daemon_exits_when_disabled() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    aloe_cmd(&dir).args(["auto-backup", "off"]).assert().success();

    aloe_cmd(&dir)
        .arg("daemon")
        .assert()
        .success()
        .stdout(predicate::str::contains("Auto-backup is disabled"));
}

#[test]
fn test_status_text() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_version(&dir, "first");

    aloe_cmd(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Versions: 1 (max 50)"))
        .stdout(predicate::str::contains("Current: 1.0.0"));
}
