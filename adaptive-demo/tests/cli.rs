//! Integration Tests for the Demo Binaries
//!
//! These tests run the built binaries and check that stdout carries only
//! program output, with logging sent to stderr.

use std::process::Command;

/// Test that hello_adaptive prints exactly the two results.
#[test]
fn hello_adaptive_prints_only_results() {
    let output = Command::new(env!("CARGO_BIN_EXE_hello_adaptive"))
        .env("RUST_LOG", "debug")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "D: 3\nD: 7\n");

    // Logging still happens, on stderr
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("changed a to 3"));
}

/// Test that every stdout line of hello_animation is a JSON frame record.
#[test]
fn hello_animation_prints_one_json_object_per_frame() {
    let output = Command::new(env!("CARGO_BIN_EXE_hello_animation"))
        .arg("3")
        .env("RUST_LOG", "debug")
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let frames: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(frames.len(), 3);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame["frame"], i as u64);
        assert_eq!(frame["heading"].as_array().unwrap().len(), 2);
    }
}

/// Test that a malformed frame count is rejected before anything runs.
#[test]
fn hello_animation_rejects_bad_frame_count() {
    let output = Command::new(env!("CARGO_BIN_EXE_hello_animation"))
        .arg("many")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
