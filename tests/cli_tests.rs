//! CLI Integration Tests for Delve
//!
//! Runs the built binary for the commands that need no model provider.

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run the delve binary with arguments inside `dir`
fn run_delve(args: &[&str], dir: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_delve"))
        .args(args)
        .current_dir(dir)
        .env_remove("DELVE_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute delve")
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["--help"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_run_help_lists_thread_option() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["run", "--help"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--thread"));
    assert!(stdout.contains("--stream"));
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["--version"], dir.path());

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("delve"));
}

// =============================================================================
// Config Command Tests
// =============================================================================

#[test]
fn test_config_validate_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["--no-color", "config", "--validate"], dir.path());

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("not found, using defaults"));
    assert!(stdout.contains("Configuration is valid"));
}

#[test]
fn test_config_validate_rejects_bad_limits() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("delve.toml"),
        "[research]\nmax_researcher_iterations = 0\n",
    )
    .unwrap();

    let output = run_delve(&["--no-color", "config", "--validate"], dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_researcher_iterations"));
}

#[test]
fn test_config_full_prints_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("custom.toml"),
        "[research]\nmax_concurrent_researchers = 4\n",
    )
    .unwrap();

    let output = run_delve(&["config", "--full", "--config", "custom.toml"], dir.path());

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[research]"));
    assert!(stdout.contains("max_concurrent_researchers = 4"));
    assert!(stdout.contains("[llm]"));
}

#[test]
fn test_run_requires_message() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["run"], dir.path());
    assert!(!output.status.success());
}
