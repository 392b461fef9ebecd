//! Corruption recovery tests for the hiit binary.
//!
//! These tests verify the system can handle:
//! - Corrupted preset files
//! - Corrupted or partially written history lines
//! - Broken config files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hiit"));
    cmd.arg("--data-dir")
        .arg(dir)
        .arg("--config")
        .arg(dir.join("config.toml"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

const VALID_LINE: &str = r#"{"id":"6f1c1f6e-2c1b-4c43-9a0e-1d2a3b4c5d6e","user_id":"local","date":"2026-01-05T07:30:00Z","work_time":20,"rest_time":10,"exercises":5,"rounds":2,"total_time":290}"#;

#[test]
fn test_corrupted_preset_file() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    fs::write(dir.join("presets.json"), "{ invalid json }}}}").unwrap();

    cli(dir)
        .args(["presets", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved workouts yet"));

    // Saving replaces the unreadable document with a valid one
    cli(dir)
        .args(["presets", "save", "Fresh"])
        .assert()
        .success();

    let content = fs::read_to_string(dir.join("presets.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).expect("valid JSON");
    assert_eq!(parsed["presets"][0]["name"], "Fresh");
}

#[test]
fn test_corrupted_history_lines_ignored() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    let mut file = fs::File::create(dir.join("workouts.jsonl")).unwrap();
    writeln!(file, "{{ invalid json }}").unwrap();
    writeln!(file, "{}", VALID_LINE).unwrap();
    writeln!(file, "{{ more invalid }}").unwrap();

    cli(dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("6f1c1f6e-2c1b-4c43-9a0e-1d2a3b4c5d6e"))
        .stdout(predicate::str::contains("04:50"));
}

#[test]
fn test_partial_history_line() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    // Valid line followed by a write cut short by a crash
    let mut file = fs::File::create(dir.join("workouts.jsonl")).unwrap();
    writeln!(file, "{}", VALID_LINE).unwrap();
    write!(file, r#"{{"id":"00000000-0000-0000-0000-0000"#).unwrap();
    drop(file);

    let export = dir.join("history.csv");
    cli(dir)
        .arg("history")
        .arg("--csv")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 workouts"));
}

#[test]
fn test_replay_ignores_corrupted_history() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    let mut file = fs::File::create(dir.join("workouts.jsonl")).unwrap();
    writeln!(file, "not even json").unwrap();
    drop(file);

    cli(dir)
        .args(["run", "--from-history", "6f1c1f6e-2c1b-4c43-9a0e-1d2a3b4c5d6e"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("in history"));
}

#[test]
fn test_broken_config_is_reported() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    fs::write(dir.join("config.toml"), "[timer\nwork_time = ").unwrap();

    cli(dir)
        .args(["settings", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Toml"));
}

#[test]
fn test_missing_data_dir_is_created_on_save() {
    let temp_dir = setup_test_dir();
    let nested = temp_dir.path().join("does").join("not").join("exist");

    cli(&nested)
        .args(["presets", "save", "Nested"])
        .assert()
        .success();

    assert!(nested.join("presets.json").exists());
}
