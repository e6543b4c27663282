//! CLI Integration Tests for bindload

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn bindload_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_bindload"))
}

#[test]
fn test_platform_command() {
    let output = Command::new(bindload_binary())
        .arg("platform")
        .output()
        .expect("Failed to run bindload");

    // Unsupported hosts fail cleanly; supported ones print the key.
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("os:"));
        assert!(stdout.contains("suffixes:"));
    }
}

#[test]
fn test_candidates_from_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name":"core","releaseBinary":"out/core.node"}"#,
    )
    .unwrap();

    let output = Command::new(bindload_binary())
        .arg("candidates")
        .arg(dir.path())
        .output()
        .expect("Failed to run bindload");

    assert!(
        output.status.success(),
        "candidates failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("core.node"));
}

#[test]
fn test_load_reports_searched_paths() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(bindload_binary())
        .args(["load", "--binding", "core", "--package", "core"])
        .arg(dir.path())
        .output()
        .expect("Failed to run bindload");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("core.node"), "stderr: {}", stderr);
}
