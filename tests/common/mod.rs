//! Common test utilities for vaultenv integration tests.
//!
//! Provides `TestEnv` for isolated test environments that never read the
//! user's real `~/.config/vaultenv/config.toml`.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated directories.
///
/// - `work_dir`: the working directory (config and env files live here)
/// - `home_dir`: `HOME` / `XDG_CONFIG_HOME` for the user config
pub struct TestEnv {
    pub work_dir: TempDir,
    pub home_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().unwrap(),
            home_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the vaultenv binary, isolated from the caller's environment.
    pub fn vaultenv(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_vaultenv"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("HOME", self.home_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.home_dir.path().join(".config"));
        cmd.env_remove("VAULTENV_VAULT");
        cmd.env_remove("VAULTENV_ENV_FILE");
        cmd.env_remove("AZURE_ACCESS_TOKEN");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Write a file relative to the working directory.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.work_dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Read a file relative to the working directory.
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.work_dir.path().join(name)).unwrap()
    }

    /// Write the user config.toml.
    pub fn write_user_config(&self, content: &str) {
        let dir = self.home_dir.path().join(".config").join("vaultenv");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse JSON from command output.
pub fn parse_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}
