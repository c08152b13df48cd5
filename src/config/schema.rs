//! Schema definitions for the project config (JSON) and user config (TOML).
//!
//! The project config is parsed into a loose `serde_json::Value` first so each
//! malformed field gets its own message, then validated once into typed values.
//! Nothing downstream sees the raw JSON.

use crate::engine::NameCase;
use crate::envfile::EnvFile;
use crate::models::{Grouping, InputSpec, Property, PropertyInput, PropertySchema};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A literal value from `PROPERTY_VALUES`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LiteralValue {
    One(String),
    /// Written as `KEY_1`, `KEY_2`, ...
    Many(Vec<String>),
}

/// Validated project config.
///
/// # JSON Schema
///
/// ```json
/// {
///   "PROPERTIES": { "COLOR": ["red", "blue"], "NOTES": null, "UNUSED": [], "TIER": "gold" },
///   "GROUPINGS": { "db": { "KEYS": ["DB_HOST"], "VALUES": ["dev", "prod"] } },
///   "FILE_OUTPUT_NAME": ".env.local",
///   "JSON_LOGIC": false,
///   "AZURE_SERVER": "my-vault",
///   "PROPERTY_VALUES": { "REGION": "eu", "HOSTS": ["a", "b"] },
///   "inputs": [
///     { "key": "environment", "choices": ["dev", "prod"] },
///     { "key": "secrets", "choices": ["db-password", "api-key"] }
///   ]
/// }
/// ```
///
/// `inputs` only applies when `PROPERTIES` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectConfig {
    /// `None` when `PROPERTIES` is absent: the schema is discovered from the store
    pub schema: Option<PropertySchema>,
    pub file_output_name: Option<String>,
    pub json_logic: Option<bool>,
    pub azure_server: Option<String>,
    pub property_values: Option<Vec<(String, LiteralValue)>>,
    pub inputs: Option<Vec<InputSpec>>,
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation(message.into())
}

/// A list of strings, or a validation error naming `what`.
fn string_list(value: &Value, what: &str) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(invalid(format!("{} must be an array of strings", what)));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            _ => Err(invalid(format!("{} must be an array of strings", what))),
        })
        .collect()
}

/// Optional string field; an empty string counts as absent.
fn optional_string(root: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match root.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(format!("{} must be a string", field))),
    }
}

/// String, number or boolean as written text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn literal_scalar(value: &Value, key: &str) -> Result<String> {
    scalar_text(value).ok_or_else(|| {
        invalid(format!(
            "PROPERTY_VALUES.{} must be a string or an array of strings",
            key
        ))
    })
}

impl ProjectConfig {
    /// Parse and validate a project config document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(content)?;
        let Value::Object(root) = raw else {
            return Err(invalid("config must be a JSON object"));
        };

        let properties = match root.get("PROPERTIES") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(Self::parse_properties(map)?),
            Some(_) => return Err(invalid("PROPERTIES must be an object")),
        };

        let groupings = match root.get("GROUPINGS") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => Self::parse_groupings(map)?,
            Some(_) => return Err(invalid("GROUPINGS must be an object")),
        };

        let schema = match properties {
            Some(properties) => Some(PropertySchema::new(properties, groupings).map_err(invalid)?),
            None if !groupings.is_empty() => {
                return Err(invalid("GROUPINGS requires PROPERTIES"));
            }
            None => None,
        };

        let json_logic = match root.get("JSON_LOGIC") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => return Err(invalid("JSON_LOGIC must be a boolean")),
        };

        let property_values = match root.get("PROPERTY_VALUES") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(Self::parse_property_values(map)?),
            Some(_) => return Err(invalid("PROPERTY_VALUES must be an object")),
        };

        let inputs = match root.get("inputs") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(Self::parse_inputs(items)?),
            Some(_) => return Err(invalid("inputs must be an array")),
        };

        Ok(Self {
            schema,
            file_output_name: optional_string(&root, "FILE_OUTPUT_NAME")?,
            json_logic,
            azure_server: optional_string(&root, "AZURE_SERVER")?,
            property_values,
            inputs,
        })
    }

    /// Read and validate a project config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config {}: {}", path.display(), e),
            ))
        })?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            declared = config.schema.is_some(),
            "loaded project config"
        );
        Ok(config)
    }

    fn parse_properties(map: &Map<String, Value>) -> Result<Vec<Property>> {
        map.iter()
            .map(|(key, value)| {
                let input = match value {
                    Value::Null => PropertyInput::FreeForm,
                    Value::Array(_) => PropertyInput::from_choices(Some(string_list(
                        value,
                        &format!("PROPERTIES.{}", key),
                    )?)),
                    other => PropertyInput::Fixed(scalar_text(other).ok_or_else(|| {
                        invalid(format!(
                            "PROPERTIES.{} must be an array of strings, a value or null",
                            key
                        ))
                    })?),
                };
                Ok(Property {
                    key: key.clone(),
                    input,
                })
            })
            .collect()
    }

    fn parse_inputs(items: &[Value]) -> Result<Vec<InputSpec>> {
        let mut inputs: Vec<InputSpec> = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Value::Object(entry) = item else {
                return Err(invalid(format!("inputs[{}] must be an object", i)));
            };
            let key = match entry.get("key") {
                Some(Value::String(key)) if !key.trim().is_empty() => key.clone(),
                _ => return Err(invalid(format!("inputs[{}].key must be a non-empty string", i))),
            };
            let choices = match entry.get("choices") {
                None | Some(Value::Null) => Vec::new(),
                Some(value) => string_list(value, &format!("inputs[{}].choices", i))?,
            };
            let input = InputSpec { key, choices };
            if input.is_secrets() && input.choices.is_empty() {
                return Err(invalid(format!(
                    "inputs[{}]: '{}' needs a list of secret names in choices",
                    i, input.key
                )));
            }
            if inputs.iter().any(|other| other.env_key() == input.env_key()) {
                return Err(invalid(format!("duplicate input key '{}'", input.key)));
            }
            inputs.push(input);
        }
        Ok(inputs)
    }

    fn parse_groupings(map: &Map<String, Value>) -> Result<Vec<Grouping>> {
        map.iter()
            .map(|(name, value)| {
                let Value::Object(grouping) = value else {
                    return Err(invalid(format!("GROUPINGS.{} must be an object", name)));
                };
                let list = |field: &str| -> Result<Vec<String>> {
                    let path = format!("GROUPINGS.{}.{}", name, field);
                    match grouping.get(field) {
                        Some(value) => string_list(value, &path),
                        None => Err(invalid(format!("{} is required", path))),
                    }
                };
                Ok(Grouping {
                    name: name.clone(),
                    keys: list("KEYS")?,
                    values: list("VALUES")?,
                })
            })
            .collect()
    }

    fn parse_property_values(map: &Map<String, Value>) -> Result<Vec<(String, LiteralValue)>> {
        map.iter()
            .map(|(key, value)| {
                let literal = match value {
                    Value::Array(items) => LiteralValue::Many(
                        items
                            .iter()
                            .map(|item| literal_scalar(item, key))
                            .collect::<Result<_>>()?,
                    ),
                    other => LiteralValue::One(literal_scalar(other, key)?),
                };
                Ok((key.clone(), literal))
            })
            .collect()
    }

    /// The env file described by `PROPERTY_VALUES`, if the config has one.
    pub fn literal_env(&self) -> Option<EnvFile> {
        let values = self.property_values.as_ref()?;
        let mut env = EnvFile::new();
        for (key, value) in values {
            match value {
                LiteralValue::One(v) => env.insert(key.clone(), v.clone()),
                LiteralValue::Many(items) => {
                    for (i, v) in items.iter().enumerate() {
                        env.insert(format!("{}_{}", key, i + 1), v.clone());
                    }
                }
            }
        }
        Some(env)
    }
}

/// User defaults stored in config.toml.
///
/// # TOML Schema
///
/// ```toml
/// vault = "my-vault"
/// lowercase-names = true
/// concurrency = 8
/// env-file = ".env"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UserConfig {
    /// Default vault name or URL
    pub vault: Option<String>,
    /// Lower-case generated secret names (`false` keeps the key's case)
    pub lowercase_names: Option<bool>,
    /// Maximum concurrent store lookups (at least 1)
    pub concurrency: Option<usize>,
    /// Default env file path
    pub env_file: Option<PathBuf>,
}

impl UserConfig {
    /// Parse and validate a user config document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: UserConfig = toml::from_str(content)?;
        config.validate().map_err(Error::ConfigValidation)?;
        Ok(config)
    }

    /// Validate the config values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.concurrency == Some(0) {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.vault.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err("vault must not be empty".to_string());
        }
        Ok(())
    }

    /// Default location: `<config_dir>/vaultenv/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vaultenv").join("config.toml"))
    }

    /// Read the user config at `path`; a missing file is an empty config.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Read the user config from its default location.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Case policy implied by `lowercase-names`, if set.
    pub fn name_case(&self) -> Option<NameCase> {
        self.lowercase_names.map(|lower| {
            if lower {
                NameCase::Lower
            } else {
                NameCase::Preserve
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== ProjectConfig Tests ====================

    #[test]
    fn test_declared_config() {
        let config = ProjectConfig::from_json_str(
            r#"{
                "PROPERTIES": {"COLOR": ["red", "blue"], "NOTES": null, "UNUSED": [], "DB_HOST": null},
                "GROUPINGS": {"db": {"KEYS": ["DB_HOST"], "VALUES": ["dev", "prod"]}},
                "FILE_OUTPUT_NAME": ".env.local",
                "JSON_LOGIC": true,
                "AZURE_SERVER": "my-vault"
            }"#,
        )
        .unwrap();

        let schema = config.schema.unwrap();
        let keys: Vec<_> = schema.keys().collect();
        assert_eq!(keys, vec!["COLOR", "NOTES", "UNUSED", "DB_HOST"]);
        assert_eq!(
            schema.property("NOTES").unwrap().input,
            PropertyInput::FreeForm
        );
        assert_eq!(
            schema.property("UNUSED").unwrap().input,
            PropertyInput::Excluded
        );
        assert_eq!(schema.groupings()[0].values, vec!["dev", "prod"]);
        assert_eq!(config.file_output_name.as_deref(), Some(".env.local"));
        assert_eq!(config.json_logic, Some(true));
        assert_eq!(config.azure_server.as_deref(), Some("my-vault"));
    }

    #[test]
    fn test_plain_property_value_is_fixed() {
        let config = ProjectConfig::from_json_str(
            r#"{"PROPERTIES": {"REGION": "eu", "PORT": 8080, "DEBUG": false, "COLOR": ["red"]}}"#,
        )
        .unwrap();
        let schema = config.schema.unwrap();

        assert_eq!(
            schema.property("REGION").unwrap().input,
            PropertyInput::Fixed("eu".to_string())
        );
        assert_eq!(
            schema.property("PORT").unwrap().input,
            PropertyInput::Fixed("8080".to_string())
        );
        assert_eq!(
            schema.property("DEBUG").unwrap().input,
            PropertyInput::Fixed("false".to_string())
        );
        assert_eq!(
            schema.keys().collect::<Vec<_>>(),
            vec!["REGION", "PORT", "DEBUG", "COLOR"]
        );
    }

    #[test]
    fn test_nested_property_value_rejected() {
        let err = ProjectConfig::from_json_str(r#"{"PROPERTIES": {"A": {"x": 1}}}"#).unwrap_err();
        assert!(err.to_string().contains("PROPERTIES.A"));
    }

    #[test]
    fn test_inputs_parse() {
        let config = ProjectConfig::from_json_str(
            r#"{"inputs": [
                {"key": "environment", "choices": ["dev", "prod"]},
                {"key": "owner"},
                {"key": "secrets", "choices": ["db-password"]}
            ]}"#,
        )
        .unwrap();
        let inputs = config.inputs.unwrap();

        assert!(config.schema.is_none());
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0].choices, vec!["dev", "prod"]);
        assert!(inputs[1].choices.is_empty());
        assert!(inputs[2].is_secrets());
    }

    #[test]
    fn test_inputs_validation() {
        let cases = [
            (r#"{"inputs": {"key": "a"}}"#, "inputs must be an array"),
            (r#"{"inputs": ["a"]}"#, "inputs[0] must be an object"),
            (r#"{"inputs": [{"choices": []}]}"#, "inputs[0].key"),
            (r#"{"inputs": [{"key": "a", "choices": [1]}]}"#, "inputs[0].choices"),
            (r#"{"inputs": [{"key": "secrets"}]}"#, "list of secret names"),
            (
                r#"{"inputs": [{"key": "env"}, {"key": "ENV"}]}"#,
                "duplicate input key 'ENV'",
            ),
        ];
        for (json, message) in cases {
            let err = ProjectConfig::from_json_str(json).unwrap_err();
            assert!(
                err.to_string().contains(message),
                "{}: expected '{}', got '{}'",
                json,
                message,
                err
            );
        }
    }

    #[test]
    fn test_missing_properties_means_discovery() {
        let config = ProjectConfig::from_json_str(r#"{"AZURE_SERVER": "v"}"#).unwrap();
        assert!(config.schema.is_none());
    }

    #[test]
    fn test_properties_must_be_object() {
        let err = ProjectConfig::from_json_str(r#"{"PROPERTIES": ["A"]}"#).unwrap_err();
        assert!(err.to_string().contains("PROPERTIES must be an object"));
    }

    #[test]
    fn test_groupings_must_be_object() {
        let err =
            ProjectConfig::from_json_str(r#"{"PROPERTIES": {}, "GROUPINGS": []}"#).unwrap_err();
        assert!(err.to_string().contains("GROUPINGS must be an object"));
    }

    #[test]
    fn test_file_output_name_must_be_string() {
        let err = ProjectConfig::from_json_str(r#"{"PROPERTIES": {}, "FILE_OUTPUT_NAME": 3}"#)
            .unwrap_err();
        assert!(err.to_string().contains("FILE_OUTPUT_NAME must be a string"));
    }

    #[test]
    fn test_grouping_values_required() {
        let err = ProjectConfig::from_json_str(
            r#"{"PROPERTIES": {"A": null}, "GROUPINGS": {"g": {"KEYS": ["A"], "VALUES": []}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(_)));
        assert!(err.to_string().contains("no VALUES"));
    }

    #[test]
    fn test_key_in_two_groupings() {
        let err = ProjectConfig::from_json_str(
            r#"{"PROPERTIES": {"A": null}, "GROUPINGS": {
                "g1": {"KEYS": ["A"], "VALUES": ["x"]},
                "g2": {"KEYS": ["A"], "VALUES": ["y"]}
            }}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'A'"));
    }

    #[test]
    fn test_choice_list_must_hold_strings() {
        let err = ProjectConfig::from_json_str(r#"{"PROPERTIES": {"A": [1, 2]}}"#).unwrap_err();
        assert!(err.to_string().contains("PROPERTIES.A"));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            ProjectConfig::from_json_str("PROPERTIES="),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_empty_azure_server_is_absent() {
        let config = ProjectConfig::from_json_str(r#"{"AZURE_SERVER": "  "}"#).unwrap();
        assert_eq!(config.azure_server, None);
    }

    #[test]
    fn test_literal_env_expands_arrays() {
        let config = ProjectConfig::from_json_str(
            r#"{"PROPERTY_VALUES": {"REGION": "eu", "HOSTS": ["a", "b"], "PORT": 8080}}"#,
        )
        .unwrap();
        let env = config.literal_env().unwrap();
        assert_eq!(env.render(), "REGION=eu\nHOSTS_1=a\nHOSTS_2=b\nPORT=8080\n");
    }

    #[test]
    fn test_literal_env_absent() {
        let config = ProjectConfig::from_json_str(r#"{"PROPERTIES": {}}"#).unwrap();
        assert!(config.literal_env().is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = ProjectConfig::load(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    // ==================== UserConfig Tests ====================

    #[test]
    fn test_user_config_parse() {
        let config = UserConfig::from_toml_str(
            "vault = \"v\"\nlowercase-names = false\nconcurrency = 4\nenv-file = \".env.dev\"\n",
        )
        .unwrap();
        assert_eq!(config.vault.as_deref(), Some("v"));
        assert_eq!(config.name_case(), Some(NameCase::Preserve));
        assert_eq!(config.concurrency, Some(4));
        assert_eq!(config.env_file, Some(PathBuf::from(".env.dev")));
    }

    #[test]
    fn test_user_config_rejects_zero_concurrency() {
        let err = UserConfig::from_toml_str("concurrency = 0").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(_)));
    }

    #[test]
    fn test_user_config_rejects_unknown_keys() {
        assert!(matches!(
            UserConfig::from_toml_str("colour = \"red\""),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_user_config_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let config = UserConfig::load_from(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn test_user_config_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "lowercase-names = true\n").unwrap();

        let config = UserConfig::load_from(&path).unwrap();
        assert_eq!(config.name_case(), Some(NameCase::Lower));
    }
}
