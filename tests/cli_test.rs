//! CLI exit code and output tests.
//!
//! Tests:
//! - Help and version exit 0
//! - Argument errors exit 1
//! - Invalid connection options fail before connecting
//! - Loopback run completes with a summary

use std::process::{Command, Output};

fn spillway(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spillway"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("NATS_URL")
        .env_remove("NATS_CREDS")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .output()
        .expect("failed to run spillway")
}

#[test]
fn test_cli_help_output() {
    let output = spillway(&["--help"]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    for expected in ["send", "recv", "--server", "--creds", "--tlscert", "--tlskey", "--tlscacert"] {
        assert!(stdout.contains(expected), "help should mention {expected}");
    }
}

#[test]
fn test_send_help_mentions_window() {
    let output = spillway(&["send", "--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--window"));
}

#[test]
fn test_cli_version_output() {
    let output = spillway(&["--version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_arguments_exit_one() {
    assert_eq!(spillway(&[]).status.code(), Some(1));
    assert_eq!(spillway(&["send", "bench"]).status.code(), Some(1));
    assert_eq!(spillway(&["send", "bench", "big"]).status.code(), Some(1));
    assert_eq!(spillway(&["publish", "bench"]).status.code(), Some(1));
}

#[test]
fn test_unpaired_tls_options_exit_one() {
    let output = spillway(&["--tlscert", "client.pem", "recv", "bench"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--tlskey"));
}

#[test]
fn test_loopback_completes() {
    let output = spillway(&[
        "--log-level",
        "error",
        "loopback",
        "bench",
        "64",
        "--window",
        "100",
        "--count",
        "20000",
    ]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Sent 20000 messages"));
}

#[test]
fn test_loopback_json_summary() {
    let output = spillway(&[
        "--log-level",
        "error",
        "-o",
        "json",
        "loopback",
        "bench",
        "16",
        "--count",
        "1000",
        "--window",
        "10",
    ]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().expect("no output");
    let summary: serde_json::Value = serde_json::from_str(last).expect("invalid JSON");
    assert_eq!(summary["kind"], "send_summary");
    assert_eq!(summary["sent"], 1000);
}
