// e2e/cli_integration.rs — CLI integration tests.
//
// Drives the `ts-load` and `ts-compact` binaries as black-box tools via
// std::process::Command: argument parsing, stdin record loading, the
// datadir layout they leave behind, and exit codes.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn ts_load_bin() -> PathBuf {
    PathBuf::from(std::env::var("CARGO_BIN_EXE_ts-load").expect("CARGO_BIN_EXE_ts-load not set"))
}

fn ts_compact_bin() -> PathBuf {
    PathBuf::from(std::env::var("CARGO_BIN_EXE_ts-compact").expect("CARGO_BIN_EXE_ts-compact not set"))
}

fn run_load(datadir: &std::path::Path, args: &[&str], stdin_data: &str) -> std::process::Output {
    let mut child = Command::new(ts_load_bin())
        .args(args)
        .arg(datadir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn ts-load");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin_data.as_bytes())
        .unwrap();
    child.wait_with_output().expect("ts-load did not run")
}

// ── 1. Load then compact, end to end ─────────────────────────────────────────

#[test]
fn test_load_then_compact_round_trip() {
    let dir = TempDir::new().unwrap();

    let output = run_load(
        dir.path(),
        &[],
        "sensor-a,2020-01-01 00:00:00,1.5\nsensor-b,2020-01-01 00:00:01,2.5\n",
    );
    assert!(output.status.success(), "ts-load should exit 0: {output:?}");
    assert!(dir.path().join("input.data").exists());
    assert!(dir.path().join("input.index").exists());
    assert!(dir.path().join("journal").exists());

    let index_before = fs::read(dir.path().join("input.index")).unwrap();
    assert_eq!(index_before.len(), 16, "two 8-byte offsets");

    let status = Command::new(ts_compact_bin())
        .arg(dir.path())
        .status()
        .expect("failed to run ts-compact");
    assert!(status.success(), "ts-compact should exit 0");

    // Compacting rewrites the journal but must not touch the data it describes.
    let index_after = fs::read(dir.path().join("input.index")).unwrap();
    assert_eq!(index_before, index_after);
}

// ── 2. --version ──────────────────────────────────────────────────────────────

#[test]
fn test_cli_version() {
    let output = Command::new(ts_load_bin())
        .arg("--version")
        .output()
        .expect("failed to run ts-load --version");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ts-load"), "got: {stdout}");
}

// ── 3. --help ─────────────────────────────────────────────────────────────────

#[test]
fn test_cli_help() {
    let output = Command::new(ts_load_bin())
        .arg("--help")
        .output()
        .expect("failed to run ts-load --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.to_lowercase().contains("usage"), "got: {stdout}");
}

// ── 4. Missing datadir argument ───────────────────────────────────────────────

#[test]
fn test_cli_missing_datadir_exits_usage_error() {
    let output = Command::new(ts_load_bin())
        .stdin(Stdio::piped())
        .output()
        .expect("failed to run ts-load with no args");
    assert!(!output.status.success());
}

// ── 5. Fixed --key and --date with --interval stepping ───────────────────────

#[test]
fn test_cli_fixed_key_and_stepped_date() {
    let dir = TempDir::new().unwrap();
    let output = run_load(
        dir.path(),
        &["--key=k", "--date=2020-01-01 00:00:00", "--interval=60"],
        "1.0\n2.0\n3.0\n",
    );
    assert!(output.status.success(), "{output:?}");

    let index = fs::read(dir.path().join("input.index")).unwrap();
    assert_eq!(index.len(), 24, "three 8-byte offsets");
}

// ── 6. Re-running ts-load against an existing datadir appends, not replaces ──

#[test]
fn test_cli_rerun_appends_to_existing_data_file() {
    let dir = TempDir::new().unwrap();
    let first = run_load(dir.path(), &[], "a,2020-01-01 00:00:00,1.0\n");
    assert!(first.status.success());
    let after_first = fs::read(dir.path().join("input.data")).unwrap();

    let second = run_load(dir.path(), &[], "b,2020-01-01 00:00:00,9.0\n");
    assert!(second.status.success());
    let after_second = fs::read(dir.path().join("input.data")).unwrap();

    // The journal from the first run registers input.data as already
    // existing, so the second run's create_file is a no-op and its record
    // lands after the first run's, not over it.
    assert!(after_second.starts_with(&after_first));
    assert!(after_second.len() > after_first.len());
}
