//! CLI tests for the `autodev` binary.
//!
//! Spawns the binary and checks exit codes and REPL output. No test here
//! reaches a generation backend or a real toolchain.

use std::io::Write;
use std::process::{Command, Stdio};

use autodev::exit_codes;
use autodev::io::session::{AgentPaths, load_state};

#[test]
fn repl_status_then_exit_saves_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut child = Command::new(env!("CARGO_BIN_EXE_autodev"))
        .args(["repl", "--repo-path"])
        .arg(temp.path())
        .args(["--request", "add a health check"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn autodev repl");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"/status\nexit\n")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(
        "status> branch=- lint_ok=false tests_ok=false sec_ok=false pr=- attempts=0"
    ));

    let state = load_state(&AgentPaths::new(temp.path()).state_path).expect("session saved");
    assert_eq!(state.request(), "add a health check");
}

#[test]
fn run_rejects_missing_repo_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_autodev"))
        .args(["run", "--request", "x", "--repo-path"])
        .arg(temp.path().join("missing"))
        .output()
        .expect("run autodev");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("is not a directory"));
}

#[test]
fn run_rejects_invalid_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("bad.toml");
    std::fs::write(&config, "max_implementation_attempts = 0\n").expect("write config");
    let output = Command::new(env!("CARGO_BIN_EXE_autodev"))
        .args(["run", "--request", "x", "--repo-path"])
        .arg(temp.path())
        .arg("--config")
        .arg(&config)
        .output()
        .expect("run autodev");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(!temp.path().join(".agent").exists());
}
