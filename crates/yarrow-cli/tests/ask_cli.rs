//! CLI integration tests.
//!
//! The model endpoint points at a closed local port, so every model call
//! fails fast and the pipeline exercises its degradation paths end to end.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

/// Write a minimal passage store and config into a temp dir.
fn fixture() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();

    let store_path = dir.path().join("passages.jsonl");
    let mut store = std::fs::File::create(&store_path).unwrap();
    writeln!(
        store,
        r#"{{"id":"rev-1","text":"Fire in the lake: the image of Revolution.","entryCode":"HEX_REVOLUTION","contentType":"judgment"}}"#
    )
    .unwrap();
    writeln!(
        store,
        r#"{{"id":"pref-1","text":"A preface on the structure of the oracle.","contentType":"preface"}}"#
    )
    .unwrap();

    let config_path = dir.path().join("config.yaml");
    let mut config = std::fs::File::create(&config_path).unwrap();
    writeln!(
        config,
        "models:\n  endpoint: http://127.0.0.1:9\n  timeoutSecs: 1"
    )
    .unwrap();

    (dir, store_path, config_path)
}

#[test]
fn ask_degrades_to_apology_when_models_are_down() {
    let (_dir, store_path, config_path) = fixture();

    Command::cargo_bin("yarrow")
        .unwrap()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "ask",
            "entry Revolution meaning?",
            "--store",
            store_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("I apologize"));
}

#[test]
fn ask_json_emits_parsable_response() {
    let (_dir, store_path, config_path) = fixture();

    let output = Command::cargo_bin("yarrow")
        .unwrap()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "ask",
            "entry Revolution meaning?",
            "--store",
            store_path.to_str().unwrap(),
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let response: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(response["success"], serde_json::Value::Bool(true));
    assert_eq!(response["queryType"], "entry_specific");
    assert!(response["sources"].as_array().unwrap().iter().all(|s| {
        s["entryCode"]
            .as_str()
            .map(|c| c == "HEX_REVOLUTION")
            .unwrap_or(false)
    }));
}

#[test]
fn ask_fails_cleanly_on_missing_store() {
    let (_dir, _store_path, config_path) = fixture();

    Command::cargo_bin("yarrow")
        .unwrap()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "ask",
            "anything",
            "--store",
            "/nonexistent/passages.jsonl",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("passage store"));
}

#[test]
fn log_without_configuration_explains_itself() {
    let (_dir, _store_path, config_path) = fixture();

    Command::cargo_bin("yarrow")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "log"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No query log configured"));
}
