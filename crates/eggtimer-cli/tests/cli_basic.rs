//! Basic CLI E2E tests.
//!
//! Tests invoke the CLI binary against a throwaway data directory and verify
//! outputs. Stdin is closed, so the cook command settles open questions on
//! its own.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_eggtimer-cli"))
        .args(args)
        .env("EGGTIMER_DATA_DIR", data_dir)
        .env_remove("EGGTIMER_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Run a CLI command and expect success.
fn run_cli_success(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
    stdout
}

fn history(data_dir: &Path) -> Vec<serde_json::Value> {
    let stdout = run_cli_success(data_dir, &["history"]);
    serde_json::from_str(&stdout).expect("history should print a JSON array")
}

#[test]
fn test_resolve_prints_seconds() {
    let dir = TempDir::new().unwrap();
    let stdout = run_cli_success(dir.path(), &["resolve", "--size", "small", "--hardness", "soft"]);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["seconds"], 435);
    assert_eq!(json["display"], "07:15");
    assert_eq!(json["temperature"], "cold");
}

#[test]
fn test_resolve_rejects_unknown_size() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["resolve", "--size", "jumbo"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("jumbo"));
}

#[test]
fn test_config_set_changes_resolution() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        run_cli_success(dir.path(), &["config", "get", "timer.sample_period_ms"]).trim(),
        "100"
    );
    run_cli_success(dir.path(), &["config", "set", "durations.soft_secs", "400"]);
    assert_eq!(
        run_cli_success(dir.path(), &["config", "get", "durations.soft_secs"]).trim(),
        "400"
    );

    let stdout = run_cli_success(dir.path(), &["resolve", "--size", "small", "--hardness", "soft"]);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["seconds"], 415);

    run_cli_success(dir.path(), &["config", "reset"]);
    assert_eq!(
        run_cli_success(dir.path(), &["config", "get", "durations.soft_secs"]).trim(),
        "420"
    );
}

#[test]
fn test_config_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "timer.turbo", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));

    let (_, _, code) = run_cli(dir.path(), &["config", "get", "timer.turbo"]);
    assert_eq!(code, 1);
}

#[test]
fn test_cook_without_boiling_water_never_starts() {
    let dir = TempDir::new().unwrap();
    let stdout = run_cli_success(dir.path(), &["cook", "--boiling", "no"]);
    assert!(stdout.contains("Wait for the water to boil"));
    assert!(!stdout.contains("Cooking for"));
    assert!(history(dir.path()).is_empty());
}

#[test]
fn test_cook_with_closed_stdin_treats_boil_check_as_no() {
    let dir = TempDir::new().unwrap();
    let stdout = run_cli_success(dir.path(), &["cook"]);
    assert!(stdout.contains("Is the water boiling?"));
    assert!(stdout.contains("Wait for the water to boil"));
}

#[test]
fn test_short_cook_completes_and_is_recorded() {
    let dir = TempDir::new().unwrap();
    run_cli_success(dir.path(), &["config", "set", "durations.medium_secs", "1"]);

    let stdout = run_cli_success(
        dir.path(),
        &["cook", "--temperature", "room", "--boiling", "yes", "--alarm", "no"],
    );
    assert!(stdout.contains("Cooking for 00:01"));
    assert!(stdout.contains("Your eggs are ready!"));

    let cooks = history(dir.path());
    assert_eq!(cooks.len(), 1);
    assert_eq!(cooks[0]["outcome"], "completed");
    assert_eq!(cooks[0]["total_secs"], 1);
    assert_eq!(cooks[0]["alarm_enabled"], false);
    assert_eq!(cooks[0]["selection"]["temperature"], "room");
}
