//! Configuration for vaultenv.
//!
//! Two files feed a run:
//!
//! ## Project config (JSON)
//!
//! Passed with `--config <path>`. Declares the property schema:
//! - `PROPERTIES` - key to choice list (`null` = free-form, `[]` = never asked);
//!   absent means the schema is discovered from the store
//! - `GROUPINGS` - named key sets that share one answer
//! - `FILE_OUTPUT_NAME` - env file to write
//! - `JSON_LOGIC` - resolve in unified JSON mode
//! - `AZURE_SERVER` - vault name or URL
//! - `PROPERTY_VALUES` - literal values written without prompting
//!
//! ## User config (TOML)
//!
//! Located at `<config_dir>/vaultenv/config.toml` (e.g. `~/.config/vaultenv/config.toml`).
//! Personal defaults: `vault`, `lowercase-names`, `concurrency`, `env-file`.
//!
//! ## Precedence
//!
//! CLI flag > project config > env var > user config > defaults
//!
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, DEFAULT_CONCURRENCY, DEFAULT_ENV_FILE, ENV_FILE_ENV, Resolved,
    ResolvedSettings, VAULT_ENV, ValueSource, resolve_settings,
};
pub use schema::{LiteralValue, ProjectConfig, UserConfig};
