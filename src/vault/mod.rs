//! Secret store access.
//!
//! This module provides the store abstraction and its implementations:
//! - `KeyVaultClient` - Azure Key Vault over its REST API
//! - `MemoryStore` - In-process store for prefetched secrets and tests
//!
//! The store is read-only to vaultenv: secrets are listed and read, never
//! created, rotated or deleted.

pub mod keyvault;
pub mod memory;

pub use keyvault::{KeyVaultClient, vault_url};
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned by a secret store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No secret with this name
    #[error("Secret '{0}' not found")]
    NotFound(String),

    /// Credentials rejected (401)
    #[error("Unauthorized: the store rejected the access token")]
    Unauthorized,

    /// Credentials valid but lacking permission (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Token acquisition failed
    #[error("Could not obtain an access token: {0}")]
    Credential(String),

    /// Network or other HTTP error
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse a store response
    #[error("Failed to parse store response: {0}")]
    Parse(String),
}

impl StoreError {
    /// True when the failure is about access to the store as a whole, so every
    /// other lookup would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Unauthorized | StoreError::Forbidden(_) | StoreError::Credential(_)
        )
    }
}

/// Listing entry for one secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretProperties {
    pub name: String,
    pub tags: BTreeMap<String, String>,
}

/// Read-only access to a secret store.
///
/// Stores are shared across lookup threads, so they must be `Send + Sync`.
pub trait SecretStore: Send + Sync {
    /// Fetch a secret's current value by name.
    fn get_secret(&self, name: &str) -> Result<String, StoreError>;

    /// List every secret's name and tags.
    fn list_secrets(&self) -> Result<Vec<SecretProperties>, StoreError>;

    /// Store location for display (e.g. the vault URL).
    fn location(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_failures_are_fatal() {
        assert!(StoreError::Unauthorized.is_fatal());
        assert!(StoreError::Forbidden("denied".to_string()).is_fatal());
        assert!(StoreError::Credential("no az".to_string()).is_fatal());

        assert!(!StoreError::NotFound("a".to_string()).is_fatal());
        assert!(!StoreError::Parse("bad".to_string()).is_fatal());
        assert!(!StoreError::Http("reset".to_string()).is_fatal());
    }
}
