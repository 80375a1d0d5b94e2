#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the resource-token-sample binary

use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Run the binary with a clean account environment
fn run_sample(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_resource-token-sample"))
        .args(args)
        .env_remove("ACCOUNT_URI")
        .env_remove("ACCOUNT_KEY")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute resource-token-sample")
}

#[test]
fn test_cli_help_command() {
    let output = run_sample(&["--help"]);
    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"), "Should contain usage information");
    assert!(stdout.contains("run"), "Should contain 'run' subcommand");
    assert!(stdout.contains("check"), "Should contain 'check' subcommand");
    assert!(stdout.contains("--endpoint"), "Should mention endpoint option");
    assert!(stdout.contains("ACCOUNT_KEY"), "Should mention key variable");
}

#[test]
fn test_cli_version_command() {
    let output = run_sample(&["--version"]);
    assert!(output.status.success(), "Version command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("resource-token-sample"));
    assert!(stdout.chars().any(|c| c.is_ascii_digit()));
}

#[test]
fn test_cli_missing_config_file() {
    let output = run_sample(&["--config", "/nonexistent/sample.yaml", "check"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "{stderr}");
}

#[test]
fn test_cli_check_requires_endpoint() {
    let output = run_sample(&["check"]);
    assert!(!output.status.success(), "Check without an account should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("account.endpoint"), "{stderr}");
}

#[test]
fn test_cli_check_rejects_plain_http() {
    let output = run_sample(&["--endpoint", "http://localhost:8081/", "--key", "a2V5", "check"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("scheme"), "{stderr}");
}

#[test]
fn test_cli_check_with_emulator() {
    let output = run_sample(&["--emulator", "check"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration is valid"));
}

#[test]
fn test_cli_run_with_emulator() {
    let output = run_sample(&["--emulator", "run"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("permission 'resource-token-permission': created"), "{stdout}");
    assert!(stdout.contains("read: not found"), "{stdout}");
    assert!(stdout.contains("query: succeeded (1 item(s))"), "{stdout}");
    assert!(stdout.contains("upsert: failed (forbidden"), "{stdout}");
}

#[test]
fn test_cli_print_config_redacts_key() {
    let output = run_sample(&[
        "--endpoint",
        "https://account.example.com/",
        "--key",
        "c3VwZXItc2VjcmV0",
        "--print-config",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Effective configuration"));
    assert!(stdout.contains("https://account.example.com/"));
    assert!(!stdout.contains("c3VwZXItc2VjcmV0"), "key leaked: {stdout}");
}

#[test]
fn test_cli_config_file_is_applied() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sample.yaml");
    std::fs::write(
        &path,
        "sample:\n  database: from-file\n  read_only_scenario: false\nlogging:\n  format: json\n",
    )
    .unwrap();

    let output = run_sample(&["--config", path.to_str().unwrap(), "--emulator", "run"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("database 'from-file': created"), "{stdout}");
    assert!(!stdout.contains("read-only"), "{stdout}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.lines().any(|l| l.starts_with('{')), "{stderr}");
}

#[test]
fn test_cli_invalid_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "sample:\n  no_such_field: 1\n").unwrap();

    let output = run_sample(&["--config", path.to_str().unwrap(), "check"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration"), "{stderr}");
}
