//! Operator CLI against a real database file.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn relay_cli(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_relay-cli"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("DATA_DIR")
        .env_remove("DB_NAME")
        .env_remove("MAX_DB_CONNECTIONS")
        .env_remove("DB_TIMEOUT")
        .output()
        .unwrap()
}

fn json(output: &Output) -> Value {
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_link_lookup_unlink() {
    let dir = tempfile::tempdir().unwrap();

    let linked = json(&relay_cli(dir.path(), &["link", "--user", "42", "--topic", "777"]));
    assert_eq!(linked["linked"], true);

    let topic = json(&relay_cli(dir.path(), &["get-topic", "--user", "42"]));
    assert_eq!(topic["topic_id"], 777);

    let user = json(&relay_cli(dir.path(), &["get-user", "--topic", "777"]));
    assert_eq!(user["user_id"], 42);

    let stats = json(&relay_cli(dir.path(), &["stats"]));
    assert_eq!(stats["mappings"], 1);

    let removed = json(&relay_cli(dir.path(), &["unlink", "--user", "42"]));
    assert_eq!(removed["removed"], true);
    assert!(dir.path().join("database.db").exists());
}

#[test]
fn test_invalid_db_name_is_rejected_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let output = relay_cli(dir.path(), &["--db-name", "../escape.db", "stats"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DB_NAME"), "stderr: {stderr}");
    assert!(!dir.path().parent().unwrap().join("escape.db").exists());
}

#[test]
fn test_oversized_timeout_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_relay-cli"))
        .arg("--data-dir")
        .arg(dir.path())
        .arg("stats")
        .env("DB_TIMEOUT", "1e20")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DB_TIMEOUT"), "stderr: {stderr}");
    assert!(!stderr.contains("panicked"), "stderr: {stderr}");
}
