#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

/// Run the CLI against `api` with an isolated session file.
pub fn run_cli(args: &[&str], session_file: &Path, api: &str) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_questlog"));
    cmd.args(args);
    cmd.env("QUESTLOG_API", api);
    cmd.env("QUESTLOG_SESSION_FILE", session_file);
    cmd.env_remove("RUST_LOG");
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI and expect success.
pub fn run_cli_success(args: &[&str], session_file: &Path, api: &str) -> String {
    let output = run_cli(args, session_file, api);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Read one slot of the session file.
pub fn session_slot(session_file: &Path, key: &str) -> Option<String> {
    let raw = std::fs::read_to_string(session_file).ok()?;
    let slots: serde_json::Value = serde_json::from_str(&raw).ok()?;
    slots[key].as_str().map(str::to_string)
}
