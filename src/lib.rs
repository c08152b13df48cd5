//! vaultenv - Materialize `.env` files from a property schema and a remote secret store.
//!
//! This library provides the core functionality for the `vaultenv` CLI tool:
//! query planning over a property schema (or over groupings inferred from the
//! store itself), answer collection, secret resolution, and merging the result
//! with a previously written env file.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod envfile;
pub mod identity;
pub mod models;
pub mod prompt;
pub mod vault;


/// Library-level error type for vaultenv operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    ConfigValidation(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Secret store error: {0}")]
    Store(#[from] vault::StoreError),

    #[error("Credential error: {0}")]
    Credential(#[from] identity::CredentialError),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for vaultenv operations.
pub type Result<T> = std::result::Result<T, Error>;
