//! End-to-end CLI tests for the tabfetch binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};
use support::workbook::{SheetColumn, write_workbook};

/// Binary with an isolated config directory so a developer's config is never read.
fn tabfetch(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tabfetch").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let config = TempDir::new().unwrap();
    tabfetch(config.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Download the images linked"))
        .stdout(predicate::str::contains("--columns"));
}

#[test]
fn test_binary_version_displays_version() {
    let config = TempDir::new().unwrap();
    tabfetch(config.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tabfetch"));
}

#[test]
fn test_binary_requires_input_dir() {
    let config = TempDir::new().unwrap();
    tabfetch(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("INPUT_DIR"));
}

#[test]
fn test_binary_invalid_concurrency_rejected() {
    let config = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    tabfetch(config.path())
        .arg(input.path())
        .args(["-c", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_input_dir_fails() {
    let config = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    tabfetch(config.path())
        .arg(input.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_empty_input_dir_succeeds() {
    let config = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    tabfetch(config.path())
        .arg(input.path())
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("Done: 0 downloaded, 0 failed"));
}

#[test]
fn test_invalid_config_file_fails() {
    let config = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let dir = config.path().join("tabfetch");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "concurrency = 0\n").unwrap();

    tabfetch(config.path())
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_workbook_run_writes_files_and_json_report() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img"))
        .mount(&mock_server)
        .await;
    let base = mock_server.uri();

    let config = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_workbook(
        &input.path().join("shoes.xlsx"),
        &[
            SheetColumn::new("Name", &["boot", "sandal"]),
            SheetColumn::new("Picture", &[&format!("{base}/boot.jpg"), &format!("{base}/sandal.jpg")]),
        ],
    );

    let assert = tabfetch(config.path())
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .args(["--json", "-q"])
        .assert()
        .success();

    let stdout = &assert.get_output().stdout;
    let report: serde_json::Value = serde_json::from_slice(stdout).unwrap();
    assert_eq!(report["totals"]["succeeded"], 2);
    assert_eq!(report["totals"]["failed"], 0);
    assert_eq!(report["interrupted"], false);
    assert_eq!(report["sources"][0]["columns"][0], "Picture");

    let folder = output.path().join("shoes (2)");
    assert_eq!(std::fs::read(folder.join("boot.jpg")).unwrap(), b"img");
    assert!(folder.join("sandal.jpg").exists());
}
