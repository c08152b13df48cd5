//! Unified precedence resolution for run settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Project config (`AZURE_SERVER`, `FILE_OUTPUT_NAME`, `JSON_LOGIC`)
//! 3. Environment variables (`VAULTENV_VAULT`, `VAULTENV_ENV_FILE`)
//! 4. User config.toml (`<config_dir>/vaultenv/config.toml`)
//! 5. Built-in defaults
//!
//! Not every setting has every layer; see [`resolve_settings`].

use crate::config::{ProjectConfig, UserConfig};
use crate::engine::{NameCase, ResolutionMode};
use std::path::PathBuf;

/// Environment variable naming the vault.
pub const VAULT_ENV: &str = "VAULTENV_VAULT";

/// Environment variable naming the env file to write.
pub const ENV_FILE_ENV: &str = "VAULTENV_ENV_FILE";

/// Default env file path.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Default number of concurrent store lookups.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from the project config file
    ProjectConfig,
    /// Value from environment variable
    EnvVar(String),
    /// Value from the user config file
    UserConfig,
    /// Built-in default value
    Default,
    /// Typed in at the prompt
    Prompt,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::ProjectConfig => write!(f, "project"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::UserConfig => write!(f, "user"),
            ValueSource::Default => write!(f, "default"),
            ValueSource::Prompt => write!(f, "prompt"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for settings resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub vault: Option<String>,
    pub env_file: Option<PathBuf>,
    /// `--json-logic`
    pub json_logic: bool,
    /// `--preserve-case`
    pub preserve_case: bool,
    pub concurrency: Option<usize>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vault(mut self, vault: impl Into<String>) -> Self {
        self.vault = Some(vault.into());
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn with_json_logic(mut self) -> Self {
        self.json_logic = true;
        self
    }

    pub fn with_preserve_case(mut self) -> Self {
        self.preserve_case = true;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

/// Fully resolved settings with source tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    /// Vault name or URL; `None` means it still has to be asked for
    pub vault: Option<Resolved<String>>,
    pub env_file: Resolved<PathBuf>,
    pub mode: Resolved<ResolutionMode>,
    pub case: Resolved<NameCase>,
    pub concurrency: Resolved<usize>,
}

impl ResolvedSettings {
    /// Get the vault value, if set.
    pub fn vault(&self) -> Option<&str> {
        self.vault.as_ref().map(|r| r.value.as_str())
    }
}

/// Read a non-empty environment variable.
fn env_var(name: &str) -> Option<Resolved<String>> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| Resolved::new(v, ValueSource::EnvVar(name.to_string())))
}

/// Resolve run settings with the full precedence chain.
///
/// - vault: CLI > `AZURE_SERVER` > `VAULTENV_VAULT` > user `vault`
/// - env file: CLI > `FILE_OUTPUT_NAME` > `VAULTENV_ENV_FILE` > user `env-file` > `.env`
/// - mode: CLI `--json-logic` > `JSON_LOGIC` > direct
/// - case: CLI `--preserve-case` > user `lowercase-names` > the mode's default
/// - concurrency: CLI > user `concurrency` > 8
pub fn resolve_settings(
    project: &ProjectConfig,
    user: &UserConfig,
    overrides: &ConfigOverrides,
) -> ResolvedSettings {
    let vault = if let Some(ref vault) = overrides.vault {
        Some(Resolved::new(vault.clone(), ValueSource::CliFlag))
    } else if let Some(ref vault) = project.azure_server {
        Some(Resolved::new(vault.clone(), ValueSource::ProjectConfig))
    } else if let Some(vault) = env_var(VAULT_ENV) {
        Some(vault)
    } else {
        user.vault
            .as_ref()
            .map(|v| Resolved::new(v.clone(), ValueSource::UserConfig))
    };

    let env_file = if let Some(ref path) = overrides.env_file {
        Resolved::new(path.clone(), ValueSource::CliFlag)
    } else if let Some(ref name) = project.file_output_name {
        Resolved::new(PathBuf::from(name), ValueSource::ProjectConfig)
    } else if let Some(path) = env_var(ENV_FILE_ENV) {
        Resolved::new(PathBuf::from(path.value), path.source)
    } else if let Some(ref path) = user.env_file {
        Resolved::new(path.clone(), ValueSource::UserConfig)
    } else {
        Resolved::new(PathBuf::from(DEFAULT_ENV_FILE), ValueSource::Default)
    };

    let mode = if overrides.json_logic {
        Resolved::new(ResolutionMode::UnifiedJson, ValueSource::CliFlag)
    } else if let Some(json_logic) = project.json_logic {
        let mode = if json_logic {
            ResolutionMode::UnifiedJson
        } else {
            ResolutionMode::Direct
        };
        Resolved::new(mode, ValueSource::ProjectConfig)
    } else {
        Resolved::new(ResolutionMode::Direct, ValueSource::Default)
    };

    let case = if overrides.preserve_case {
        Resolved::new(NameCase::Preserve, ValueSource::CliFlag)
    } else if let Some(case) = user.name_case() {
        Resolved::new(case, ValueSource::UserConfig)
    } else {
        Resolved::new(mode.value.default_name_case(), ValueSource::Default)
    };

    let concurrency = if let Some(n) = overrides.concurrency {
        Resolved::new(n.max(1), ValueSource::CliFlag)
    } else if let Some(n) = user.concurrency {
        Resolved::new(n.max(1), ValueSource::UserConfig)
    } else {
        Resolved::new(DEFAULT_CONCURRENCY, ValueSource::Default)
    };

    ResolvedSettings {
        vault,
        env_file,
        mode,
        case,
        concurrency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Clears the vaultenv env vars for the duration of a test.
    struct EnvGuard;

    impl EnvGuard {
        fn new() -> Self {
            // SAFETY: tests touching these variables are #[serial]
            unsafe {
                std::env::remove_var(VAULT_ENV);
                std::env::remove_var(ENV_FILE_ENV);
            }
            EnvGuard
        }

        fn set(&self, name: &str, value: &str) {
            // SAFETY: see above
            unsafe { std::env::set_var(name, value) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: see above
            unsafe {
                std::env::remove_var(VAULT_ENV);
                std::env::remove_var(ENV_FILE_ENV);
            }
        }
    }

    // ==================== ValueSource Tests ====================

    #[test]
    fn test_value_source_display() {
        assert_eq!(
            format!("{}", ValueSource::EnvVar("FOO".to_string())),
            "env:FOO"
        );
        assert_eq!(format!("{}", ValueSource::CliFlag), "cli");
        assert_eq!(format!("{}", ValueSource::ProjectConfig), "project");
        assert_eq!(format!("{}", ValueSource::UserConfig), "user");
        assert_eq!(format!("{}", ValueSource::Default), "default");
        assert_eq!(format!("{}", ValueSource::Prompt), "prompt");
    }

    // ==================== Settings Resolution Tests ====================

    #[test]
    #[serial]
    fn test_defaults() {
        let _env = EnvGuard::new();
        let settings = resolve_settings(
            &ProjectConfig::default(),
            &UserConfig::default(),
            &ConfigOverrides::new(),
        );

        assert!(settings.vault.is_none());
        assert_eq!(settings.env_file.value, PathBuf::from(".env"));
        assert_eq!(settings.env_file.source, ValueSource::Default);
        assert_eq!(settings.mode.value, ResolutionMode::Direct);
        assert_eq!(settings.case.value, NameCase::Lower);
        assert_eq!(settings.concurrency.value, 8);
    }

    #[test]
    #[serial]
    fn test_cli_beats_project() {
        let _env = EnvGuard::new();
        let project = ProjectConfig {
            azure_server: Some("project-vault".to_string()),
            file_output_name: Some(".env.project".to_string()),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new()
            .with_vault("cli-vault")
            .with_env_file(".env.cli");

        let settings = resolve_settings(&project, &UserConfig::default(), &overrides);

        assert_eq!(settings.vault(), Some("cli-vault"));
        assert_eq!(settings.vault.unwrap().source, ValueSource::CliFlag);
        assert_eq!(settings.env_file.value, PathBuf::from(".env.cli"));
    }

    #[test]
    #[serial]
    fn test_project_beats_env_var() {
        let env = EnvGuard::new();
        env.set(VAULT_ENV, "env-vault");
        let project = ProjectConfig {
            azure_server: Some("project-vault".to_string()),
            ..Default::default()
        };

        let settings = resolve_settings(&project, &UserConfig::default(), &ConfigOverrides::new());
        assert_eq!(settings.vault(), Some("project-vault"));
        assert_eq!(settings.vault.unwrap().source, ValueSource::ProjectConfig);
    }

    #[test]
    #[serial]
    fn test_env_var_beats_user_config() {
        let env = EnvGuard::new();
        env.set(VAULT_ENV, "env-vault");
        env.set(ENV_FILE_ENV, ".env.from-env");
        let user = UserConfig {
            vault: Some("user-vault".to_string()),
            env_file: Some(PathBuf::from(".env.user")),
            ..Default::default()
        };

        let settings = resolve_settings(&ProjectConfig::default(), &user, &ConfigOverrides::new());

        assert_eq!(settings.vault(), Some("env-vault"));
        assert_eq!(
            settings.vault.unwrap().source,
            ValueSource::EnvVar(VAULT_ENV.to_string())
        );
        assert_eq!(settings.env_file.value, PathBuf::from(".env.from-env"));
    }

    #[test]
    #[serial]
    fn test_user_config_fallback() {
        let _env = EnvGuard::new();
        let user = UserConfig {
            vault: Some("user-vault".to_string()),
            lowercase_names: Some(false),
            concurrency: Some(2),
            env_file: None,
        };

        let settings = resolve_settings(&ProjectConfig::default(), &user, &ConfigOverrides::new());

        assert_eq!(settings.vault(), Some("user-vault"));
        assert_eq!(settings.case.value, NameCase::Preserve);
        assert_eq!(settings.case.source, ValueSource::UserConfig);
        assert_eq!(settings.concurrency.value, 2);
    }

    #[test]
    #[serial]
    fn test_json_logic_sets_mode_and_case() {
        let _env = EnvGuard::new();
        let project = ProjectConfig {
            json_logic: Some(true),
            ..Default::default()
        };

        let settings = resolve_settings(&project, &UserConfig::default(), &ConfigOverrides::new());

        assert_eq!(settings.mode.value, ResolutionMode::UnifiedJson);
        assert_eq!(settings.mode.source, ValueSource::ProjectConfig);
        assert_eq!(settings.case.value, NameCase::Preserve);
    }

    #[test]
    #[serial]
    fn test_cli_flags_for_mode_case_and_concurrency() {
        let _env = EnvGuard::new();
        let project = ProjectConfig {
            json_logic: Some(false),
            ..Default::default()
        };
        let user = UserConfig {
            lowercase_names: Some(true),
            concurrency: Some(3),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new()
            .with_json_logic()
            .with_preserve_case()
            .with_concurrency(16);

        let settings = resolve_settings(&project, &user, &overrides);

        assert_eq!(settings.mode.value, ResolutionMode::UnifiedJson);
        assert_eq!(settings.case.value, NameCase::Preserve);
        assert_eq!(settings.concurrency.value, 16);
        assert_eq!(settings.concurrency.source, ValueSource::CliFlag);
    }
}
