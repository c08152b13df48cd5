//! Secret name normalization.
//!
//! Env keys use `_` separators while the store only accepts `-`, so
//! `ADMIN_API_CLIENT_ID` with answer `002` becomes `admin-api-client-id-002`
//! (or `ADMIN-API-CLIENT-ID-002` when case is preserved).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used in store names.
pub const NAME_SEPARATOR: char = '-';

/// Case policy applied when building a store name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    /// Lower-case the key and discriminant.
    Lower,
    /// Keep the key and discriminant as given.
    Preserve,
}

impl NameCase {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lower" | "lowercase" => Some(NameCase::Lower),
            "preserve" | "keep" => Some(NameCase::Preserve),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NameCase::Lower => "lower",
            NameCase::Preserve => "preserve",
        }
    }

    fn apply(&self, s: &str) -> String {
        match self {
            NameCase::Lower => s.to_lowercase(),
            NameCase::Preserve => s.to_string(),
        }
    }
}

impl fmt::Display for NameCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the store name for `key`, optionally suffixed with a discriminant.
///
/// Without a discriminant the base name is returned alone; that form is used
/// for unified JSON lookups where one secret holds every variant. An empty
/// discriminant counts as absent.
pub fn secret_name(key: &str, discriminant: Option<&str>, case: NameCase) -> String {
    let base = case.apply(&key.replace('_', &NAME_SEPARATOR.to_string()));
    match discriminant.filter(|d| !d.is_empty()) {
        Some(d) => {
            let suffix = case.apply(&d.replace('_', &NAME_SEPARATOR.to_string()));
            format!("{}{}{}", base, NAME_SEPARATOR, suffix)
        }
        None => base,
    }
}
