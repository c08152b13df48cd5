//! CLI argument definitions for vaultenv.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

/// Version string with the build commit and timestamp.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VAULTENV_GIT_COMMIT"),
    " ",
    env!("VAULTENV_BUILD_TIMESTAMP"),
    ")"
);

/// vaultenv - Materialize a .env file from a property schema and Azure Key Vault.
///
/// Without a subcommand, runs `sync`: asks for the configured properties, resolves
/// each answer to a secret and writes the merged env file.
#[derive(Parser, Debug)]
#[command(name = "vaultenv")]
#[command(author, version, long_version = LONG_VERSION, about = "Materialize .env files from a property schema and Azure Key Vault secrets", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags shared by every command that loads a config.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Project config file (JSON). Without PROPERTIES the schema is discovered from the vault.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Env file to write (default: FILE_OUTPUT_NAME, then VAULTENV_ENV_FILE, then .env)
    #[arg(long = "env-file", global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Key Vault name or URL (default: AZURE_SERVER, then VAULTENV_VAULT)
    #[arg(long, global = true, value_name = "NAME|URL")]
    pub vault: Option<String>,

    /// Ask every property again instead of offering a selection
    #[arg(long, global = true)]
    pub recreate: bool,

    /// Resolve from one JSON secret per key (the answer picks a field)
    #[arg(long = "json-logic", global = true)]
    pub json_logic: bool,

    /// Keep the key's case in generated secret names
    #[arg(long = "preserve-case", global = true)]
    pub preserve_case: bool,

    /// Maximum concurrent Key Vault lookups
    #[arg(long, global = true, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,
}

impl RunArgs {
    /// CLI layer of the settings precedence chain.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            vault: self.vault.clone(),
            env_file: self.env_file.clone(),
            json_logic: self.json_logic,
            preserve_case: self.preserve_case,
            concurrency: self.concurrency.map(usize::from),
        }
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask, resolve and write the env file (the default)
    Sync,

    /// Print the query plan without asking anything
    ///
    /// The vault is only contacted when the schema is discovered.
    Plan,

    /// Print the signed-in user's email
    Whoami,
}
