//! Smoke tests for the vaultenv CLI.
//!
//! These tests verify basic CLI functionality:
//! - `vaultenv --version` outputs version info
//! - `vaultenv --help` lists the commands and run flags
//! - unknown flags fail

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the vaultenv binary.
fn vaultenv() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vaultenv"))
}

#[test]
fn test_version_flag() {
    vaultenv()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vaultenv"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    vaultenv()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--recreate"))
        .stdout(predicate::str::contains("--json-logic"));
}

#[test]
fn test_help_lists_subcommands() {
    vaultenv()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("whoami"));
}

#[test]
fn test_plan_help() {
    vaultenv()
        .args(["plan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("query plan"));
}

#[test]
fn test_unknown_flag_fails() {
    vaultenv().arg("--no-such-flag").assert().failure();
}

#[test]
fn test_zero_concurrency_rejected() {
    vaultenv()
        .args(["plan", "--concurrency", "0"])
        .assert()
        .failure();
}
