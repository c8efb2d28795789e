//! Integration tests for the scand CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Test CLI binary exists and responds to --help
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Scan job orchestration"));
}

/// Test CLI responds to --version
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("scand"));
}

/// Test invalid subcommand shows error
#[test]
fn test_invalid_subcommand() {
    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test status of an unknown scan id fails with a not-found diagnostic
#[test]
fn test_status_unknown_scan() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("scans.db");

    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--db")
        .arg(&db)
        .arg("status")
        .arg("00000000-0000-0000-0000-000000000000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

/// Test status rejects a malformed scan id before touching the store
#[test]
fn test_status_malformed_scan_id() {
    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("status")
        .arg("not-a-uuid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

/// Test listing against an empty database
#[test]
fn test_list_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("scans.db");

    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--db")
        .arg(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("no scans recorded"));
}

/// Test the config command renders the merged configuration
#[test]
fn test_config_show() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("scand.toml");
    fs::write(&config_path, "[server]\nport = 9000\n").unwrap();

    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.current_dir(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[database]"))
        .stdout(predicate::str::contains("port = 9000"));
}

#[cfg(unix)]
fn write_scanner_script(dir: &TempDir, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.path().join("scanner.sh");
    fs::write(&script, body).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(unix)]
fn write_scanner_config(dir: &TempDir, script: &std::path::Path) -> std::path::PathBuf {
    let config = dir.path().join("scand.toml");
    fs::write(
        &config,
        format!("[scanner]\ncommand = \"{}\"\n", script.display()),
    )
    .unwrap();
    config
}

/// Test a one-shot scan records findings end to end
#[test]
#[cfg(unix)]
fn test_scan_one_shot() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("scans.db");
    let script = write_scanner_script(
        &temp_dir,
        "#!/bin/sh\nprintf 'medium\\tweak cipher on 8443\\n'\nprintf 'high\\topen port 22\\n'\n",
    );
    let config = write_scanner_config(&temp_dir, &script);

    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .arg("scan")
        .arg("host-1")
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"))
        .stdout(predicate::str::contains("weak cipher on 8443"))
        .stdout(predicate::str::contains("open port 22"));
}

/// Test JSON output and that the stored record is queryable afterwards
#[test]
#[cfg(unix)]
fn test_scan_json_output_and_status() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("scans.db");
    let script = write_scanner_script(
        &temp_dir,
        "#!/bin/sh\nprintf 'critical\\texposed credentials\\n'\n",
    );
    let config = write_scanner_config(&temp_dir, &script);

    let output = Command::cargo_bin("scand")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .arg("--format")
        .arg("json")
        .arg("scan")
        .arg("host-1")
        .output()
        .unwrap();
    assert!(output.status.success());

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["state"], "completed");
    assert_eq!(record["target"], "host-1");
    assert_eq!(record["findings"][0]["severity"], "critical");

    // The same record comes back through the status command.
    let id = record["id"].as_str().unwrap();
    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--db")
        .arg(&db)
        .arg("status")
        .arg(id)
        .assert()
        .success()
        .stdout(predicate::str::contains("host-1"))
        .stdout(predicate::str::contains("exposed credentials"));
}

/// Test a failing scanner command surfaces its stderr diagnostic
#[test]
#[cfg(unix)]
fn test_scan_failure_reports_diagnostic() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("scans.db");
    let script = write_scanner_script(
        &temp_dir,
        "#!/bin/sh\necho 'target unreachable' >&2\nexit 3\n",
    );
    let config = write_scanner_config(&temp_dir, &script);

    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .arg("scan")
        .arg("host-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("target unreachable"));

    // The failed scan is on record.
    let mut list = Command::cargo_bin("scand").unwrap();
    list.arg("--db")
        .arg(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"));
}

/// Test scanning with an unknown executor kind fails without recording a scan
#[test]
#[cfg(unix)]
fn test_scan_unknown_kind() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("scans.db");
    let script = write_scanner_script(&temp_dir, "#!/bin/sh\nexit 0\n");
    let config = write_scanner_config(&temp_dir, &script);

    let mut cmd = Command::cargo_bin("scand").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .arg("scan")
        .arg("host-1")
        .arg("--kind")
        .arg("quantum")
        .assert()
        .failure()
        .stderr(predicate::str::contains("quantum"));

    let mut list = Command::cargo_bin("scand").unwrap();
    list.arg("--db")
        .arg(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("no scans recorded"));
}
