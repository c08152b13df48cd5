//! Secret resolution.
//!
//! Each answered key is looked up independently, so lookups run concurrently
//! on scoped threads (at most `concurrency` at a time). The resolver returns
//! only once every lookup has finished. A missing secret becomes a placeholder
//! value for that key and never affects the others. Losing access to the store
//! (no token, 401, 403) is not specific to one key: it fails the whole
//! resolution and no further batches are started.

use crate::Result;
use crate::engine::naming::{NameCase, secret_name};
use crate::models::{AnswerMap, ResolvedMap, ResolvedValue};
use crate::vault::{SecretStore, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;

/// How an answer maps to a secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    /// One secret per answer: `KEY` + `value` -> `key-value`.
    #[default]
    Direct,
    /// One JSON secret per key; the answer picks a field.
    UnifiedJson,
}

impl ResolutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMode::Direct => "direct",
            ResolutionMode::UnifiedJson => "unified-json",
        }
    }

    /// Case policy used when nothing else is configured.
    ///
    /// Direct names are lower-cased; unified names keep the key's case.
    pub fn default_name_case(&self) -> NameCase {
        match self {
            ResolutionMode::Direct => NameCase::Lower,
            ResolutionMode::UnifiedJson => NameCase::Preserve,
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolves answers against a store.
pub struct Resolver<'a> {
    store: &'a dyn SecretStore,
    case: NameCase,
    concurrency: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn SecretStore, case: NameCase) -> Self {
        Self {
            store,
            case,
            concurrency: 8,
        }
    }

    /// Cap the number of lookups in flight (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve every answer.
    pub fn resolve(&self, answers: &AnswerMap, mode: ResolutionMode) -> Result<ResolvedMap> {
        let pairs: Vec<(&String, &String)> = answers.iter().collect();
        let resolved = self.batched(&pairs, |&(key, value)| {
            Ok((key.clone(), self.resolve_one(key, value, mode)?))
        })?;

        let missing = resolved.values().filter(|v| v.is_placeholder()).count();
        tracing::info!(
            mode = %mode,
            resolved = resolved.len() - missing,
            missing,
            "resolved secrets"
        );
        Ok(resolved)
    }

    /// Fetch secrets by their exact store names, keyed by name.
    pub fn resolve_named(&self, names: &[String]) -> Result<ResolvedMap> {
        self.batched(names, |name| {
            let value = match self.lookup(name)? {
                Some(secret) => ResolvedValue::Secret(secret),
                None => ResolvedValue::NotFound { name: name.clone() },
            };
            Ok((name.clone(), value))
        })
    }

    /// Run `resolve` over `items` in batches of `concurrency` scoped threads.
    fn batched<T, F>(&self, items: &[T], resolve: F) -> Result<ResolvedMap>
    where
        T: Sync,
        F: Fn(&T) -> std::result::Result<(String, ResolvedValue), StoreError> + Sync,
    {
        let resolve = &resolve;
        let mut resolved = ResolvedMap::new();

        for batch in items.chunks(self.concurrency) {
            let results: Vec<_> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|item| scope.spawn(move || resolve(item)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                    .collect()
            });
            for result in results {
                let (key, value) = result?;
                resolved.insert(key, value);
            }
        }

        Ok(resolved)
    }

    /// Resolve one answered key.
    pub fn resolve_one(
        &self,
        key: &str,
        value: &str,
        mode: ResolutionMode,
    ) -> std::result::Result<ResolvedValue, StoreError> {
        match mode {
            ResolutionMode::Direct => {
                let name = secret_name(key, Some(value), self.case);
                Ok(match self.lookup(&name)? {
                    Some(secret) => ResolvedValue::Secret(secret),
                    None => ResolvedValue::NotFound { name },
                })
            }
            ResolutionMode::UnifiedJson => {
                let name = secret_name(key, None, self.case);
                let Some(raw) = self.lookup(&name)? else {
                    return Ok(ResolvedValue::NotFound { name });
                };
                let parsed: serde_json::Value = match serde_json::from_str(&raw) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::warn!(secret = %name, error = %e, "secret is not valid JSON");
                        return Ok(ResolvedValue::InvalidJson { name });
                    }
                };
                Ok(match parsed.get(value) {
                    Some(serde_json::Value::String(s)) => ResolvedValue::Field(s.clone()),
                    Some(other) => ResolvedValue::Field(other.to_string()),
                    None => {
                        tracing::warn!(secret = %name, field = %value, "field not found in secret");
                        ResolvedValue::FieldNotFound {
                            name,
                            field: value.to_string(),
                        }
                    }
                })
            }
        }
    }

    /// Fetch a secret. Per-secret failures are logged and read as absent;
    /// access failures are returned.
    fn lookup(&self, name: &str) -> std::result::Result<Option<String>, StoreError> {
        match self.store.get_secret(name) {
            Ok(value) => {
                tracing::debug!(secret = %name, "secret found");
                Ok(Some(value))
            }
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(secret = %name, "secret not found in {}", self.store.location());
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(secret = %name, error = %e, "secret lookup failed");
                Ok(None)
            }
        }
    }
}
