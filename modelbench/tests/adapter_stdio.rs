//! End-to-end adapter tests against real short-lived subprocesses.
//!
//! A shell-script stand-in for a provider CLI echoes its stdin back, which
//! drives the executor's actual spawn / stdin / capture path through the
//! adapter contract.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use modelbench::adapters::{Adapter, RunOptions};
use modelbench::adapters::goose::GooseAdapter;
use modelbench::adapters::ollama::OllamaAdapter;
use modelbench::io::discovery::Discovery;
use tempfile::TempDir;

/// Write an executable script that ignores its argv and echoes stdin.
fn fake_cli(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("meta").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

#[test]
fn adapter_round_trips_prompt_over_stdin() {
    let temp = TempDir::new().expect("tempdir");
    let script = fake_cli(&temp, "ollama", "cat");

    let adapter = OllamaAdapter::new(Discovery::new()).with_binary(&script);
    let mut options = RunOptions::new("llama3.2").with_timeout(Duration::from_secs(5));
    let result = adapter.run("round trip me", &mut options);

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "round trip me");
    assert!(result.error.is_none());
}

#[test]
fn adapter_surfaces_stderr_on_nonzero_exit() {
    let temp = TempDir::new().expect("tempdir");
    let script = fake_cli(&temp, "goose", "echo 'model exploded' 1>&2; exit 3");

    let adapter = GooseAdapter::new(Discovery::new()).with_binary(&script);
    let mut options = RunOptions::new("default").with_timeout(Duration::from_secs(5));
    let result = adapter.run("hi", &mut options);

    assert_eq!(result.exit_code, 3);
    assert_eq!(result.error.as_deref(), Some("model exploded"));
}

#[test]
fn adapter_streams_lines_in_order_with_ttft() {
    let temp = TempDir::new().expect("tempdir");
    // Reads stdin fully, then emits two lines with a pause between them.
    let script = fake_cli(
        &temp,
        "ollama",
        "data=$(cat)\necho \"first:$data\"\nsleep 0.2\necho second",
    );

    let adapter = OllamaAdapter::new(Discovery::new()).with_binary(&script);
    let mut chunks = Vec::new();
    let mut callback = |chunk: &str| chunks.push(chunk.to_string());
    let mut options = RunOptions::new("llama3.2")
        .with_timeout(Duration::from_secs(5))
        .streaming(&mut callback);
    let result = adapter.run("hello", &mut options);

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.chunks, vec!["first:hello\n", "second\n"]);
    assert_eq!(chunks, result.chunks);
    let ttft = result.ttft_ms.expect("ttft recorded");
    assert!(ttft <= result.wall_time_ms);
}

#[test]
fn adapter_times_out_against_hung_binary() {
    let temp = TempDir::new().expect("tempdir");
    let script = fake_cli(&temp, "ollama", "sleep 10");

    let adapter = OllamaAdapter::new(Discovery::new()).with_binary(&script);
    let mut options = RunOptions::new("llama3.2").with_timeout(Duration::from_millis(200));
    let result = adapter.run("hi", &mut options);

    assert_ne!(result.exit_code, 0);
    assert!(result.error.is_some());
    // Kill happens near the deadline, not after the sleep finishes.
    assert!(result.wall_time_ms < 5_000);
}

#[test]
fn missing_binary_is_idempotent_127() {
    let adapter = OllamaAdapter::new(Discovery::new())
        .with_binary("/nonexistent/path/to/ollama-modelbench-test");
    for _ in 0..2 {
        let mut options = RunOptions::new("llama3.2").with_timeout(Duration::from_secs(1));
        let result = adapter.run("hi", &mut options);
        assert_eq!(result.exit_code, 127);
        assert!(result.error.expect("error").contains("Command not found"));
    }
}
