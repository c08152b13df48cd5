//! In-process secret store.
//!
//! Names are matched case-insensitively, like Key Vault does. A discovery run
//! loads every fetched secret into one of these so field lookups never go back
//! to the network.

use super::{SecretProperties, SecretStore, StoreError};
use crate::models::SecretRecord;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// (name, tags, value) in insertion order
    secrets: Vec<(String, BTreeMap<String, String>, Option<String>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a secret.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.upsert(name.into(), BTreeMap::new(), Some(value.into()));
    }

    /// Builder form of [`MemoryStore::insert`].
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a secret carrying tags.
    pub fn with_tagged_secret(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        tags: &[(&str, &str)],
    ) -> Self {
        let tags = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.upsert(name.into(), tags, Some(value.into()));
        self
    }

    fn upsert(&mut self, name: String, tags: BTreeMap<String, String>, value: Option<String>) {
        match self
            .secrets
            .iter_mut()
            .find(|(n, _, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, tags, value),
            None => self.secrets.push((name, tags, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl From<&[SecretRecord]> for MemoryStore {
    /// Records without a value are listed but never found by `get_secret`.
    fn from(records: &[SecretRecord]) -> Self {
        let mut store = Self::new();
        for record in records {
            store.upsert(record.name.clone(), record.tags.clone(), record.value.clone());
        }
        store
    }
}

impl SecretStore for MemoryStore {
    fn get_secret(&self, name: &str) -> Result<String, StoreError> {
        self.secrets
            .iter()
            .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, _, value)| value.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn list_secrets(&self) -> Result<Vec<SecretProperties>, StoreError> {
        Ok(self
            .secrets
            .iter()
            .map(|(name, tags, _)| SecretProperties {
                name: name.clone(),
                tags: tags.clone(),
            })
            .collect())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
