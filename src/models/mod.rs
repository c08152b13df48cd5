//! Data models shared by the resolution pipeline.
//!
//! This module defines the core data structures:
//! - `PropertySchema` - Validated properties and groupings from a project config
//! - `InputSpec` - One entry of a config-driven `inputs` list
//! - `SecretRecord` - A secret listed (and possibly fetched) from the store
//! - `Query` - One interactive question in a query plan
//! - `ResolvedValue` - The outcome of resolving one answered key

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Tag that places a secret into a candidate group during discovery.
pub const GROUP_TAG: &str = "group";

/// Input key whose choices are secret names to fetch.
pub const SECRETS_INPUT: &str = "secrets";

/// How a property is asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyInput {
    /// Pick one of a non-empty, ordered list of choices.
    Choices(Vec<String>),
    /// Type any value.
    FreeForm,
    /// Declared with an empty choice list: part of the output, never asked.
    Excluded,
    /// Declared with a plain value: written as-is, never asked or looked up.
    Fixed(String),
}

impl PropertyInput {
    /// Map a raw choice list (`None` meaning absent/null) to an input kind.
    pub fn from_choices(choices: Option<Vec<String>>) -> Self {
        match choices {
            None => PropertyInput::FreeForm,
            Some(list) if list.is_empty() => PropertyInput::Excluded,
            Some(list) => PropertyInput::Choices(list),
        }
    }

    /// Choice list, if the property is a pick-one.
    pub fn choices(&self) -> Option<&[String]> {
        match self {
            PropertyInput::Choices(list) => Some(list),
            _ => None,
        }
    }
}

/// A single declared property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub key: String,
    pub input: PropertyInput,
}

/// A named set of keys that share one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grouping {
    pub name: String,
    /// Member keys, in declaration order
    pub keys: Vec<String>,
    /// Shared choices (never empty)
    pub values: Vec<String>,
}

/// Validated property schema.
///
/// Keys are unique, grouping choice lists are non-empty and a key belongs to at
/// most one grouping. Construct through [`PropertySchema::new`] so those hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertySchema {
    properties: Vec<Property>,
    groupings: Vec<Grouping>,
}

impl PropertySchema {
    /// Build a schema, checking its invariants.
    pub fn new(properties: Vec<Property>, groupings: Vec<Grouping>) -> Result<Self, String> {
        let mut seen = std::collections::HashSet::new();
        for property in &properties {
            if property.key.trim().is_empty() {
                return Err("property keys must not be empty".to_string());
            }
            if !seen.insert(property.key.as_str()) {
                return Err(format!("duplicate property key '{}'", property.key));
            }
        }

        let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
        for grouping in &groupings {
            if grouping.keys.is_empty() {
                return Err(format!("grouping '{}' has no KEYS", grouping.name));
            }
            if grouping.values.is_empty() {
                return Err(format!("grouping '{}' has no VALUES", grouping.name));
            }
            for key in &grouping.keys {
                if let Some(other) = owner.insert(key.as_str(), grouping.name.as_str()) {
                    return Err(format!(
                        "key '{}' belongs to both grouping '{}' and '{}'",
                        key, other, grouping.name
                    ));
                }
            }
        }

        Ok(Self {
            properties,
            groupings,
        })
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn groupings(&self) -> &[Grouping] {
        &self.groupings
    }

    /// Property keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.key.as_str())
    }

    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }
}

/// One entry of an `inputs` list.
///
/// An input named [`SECRETS_INPUT`] is a multi-select over secret names; any
/// other input is a pick-one (or free-form without choices) whose answer is
/// written under the upper-cased key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    pub key: String,
    pub choices: Vec<String>,
}

impl InputSpec {
    pub fn is_secrets(&self) -> bool {
        self.key == SECRETS_INPUT
    }

    /// Output key for a non-secrets input.
    pub fn env_key(&self) -> String {
        self.key.to_uppercase()
    }
}

/// A secret as seen by this tool: its name, tags and (once fetched) its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    /// `None` when the value could not be fetched
    pub value: Option<String>,
}

impl SecretRecord {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            value,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(tag.into(), value.into());
        self
    }

    /// Value of the `group` tag, if set and non-empty.
    pub fn group(&self) -> Option<&str> {
        self.tags
            .get(GROUP_TAG)
            .map(String::as_str)
            .filter(|g| !g.is_empty())
    }

    /// Env key this secret is written under (`api-key` -> `API_KEY`).
    pub fn env_key(&self) -> String {
        env_key_for(&self.name)
    }
}

/// Derive an env key from a store name by inverting the name separator.
pub fn env_key_for(secret_name: &str) -> String {
    secret_name.replace('-', "_").to_uppercase()
}

/// One question in a query plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// One answer fanned out to every member key.
    Group {
        name: String,
        keys: Vec<String>,
        choices: Vec<String>,
    },
    /// One answer for one key; `choices: None` is free-form input.
    Individual {
        key: String,
        choices: Option<Vec<String>>,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        sensitive: bool,
    },
    /// Any number of choices for one key; the answer lists them comma-separated.
    Multi { key: String, choices: Vec<String> },
}

impl Query {
    pub fn individual(key: impl Into<String>, choices: Option<Vec<String>>) -> Self {
        Query::Individual {
            key: key.into(),
            choices,
            sensitive: false,
        }
    }

    /// Keys this query answers, in order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Query::Group { keys, .. } => keys.iter().map(String::as_str).collect(),
            Query::Individual { key, .. } | Query::Multi { key, .. } => vec![key.as_str()],
        }
    }

    /// Label shown in the update selection list.
    pub fn label(&self) -> String {
        match self {
            Query::Group { name, .. } => format!("[GROUP] {}", name),
            Query::Individual { key, .. } | Query::Multi { key, .. } => key.clone(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Query::Group { .. })
    }

    /// True for an individual query without choices.
    pub fn is_free_form(&self) -> bool {
        matches!(self, Query::Individual { choices: None, .. })
    }
}

/// Answers keyed by env key.
pub type AnswerMap = BTreeMap<String, String>;

/// Resolution outcome per env key.
pub type ResolvedMap = BTreeMap<String, ResolvedValue>;

/// The outcome of resolving one answered key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    /// Raw value of a secret found by direct lookup.
    Secret(String),
    /// A field extracted from a JSON secret.
    Field(String),
    /// The answer itself, written verbatim.
    Literal(String),
    /// No secret with this name.
    NotFound { name: String },
    /// The secret exists but has no such field.
    FieldNotFound { name: String, field: String },
    /// The secret exists but its value is not JSON.
    InvalidJson { name: String },
}

impl ResolvedValue {
    /// True for the placeholder variants.
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            ResolvedValue::NotFound { .. }
                | ResolvedValue::FieldNotFound { .. }
                | ResolvedValue::InvalidJson { .. }
        )
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Secret(v) | ResolvedValue::Field(v) | ResolvedValue::Literal(v) => {
                write!(f, "{}", v)
            }
            ResolvedValue::NotFound { name } => write!(f, "[NOT FOUND: {}]", name),
            ResolvedValue::FieldNotFound { name, field } => {
                write!(f, "[NOT FOUND: {} -> {}]", name, field)
            }
            ResolvedValue::InvalidJson { name } => write!(f, "[INVALID JSON: {}]", name),
        }
    }
}
