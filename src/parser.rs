use std::path::Path;

use serde::Deserialize;
use serde_json::Number;
use serde_json::Value;

use crate::VaktError;

/// The on-disk format of the endpoint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// TOML has no top level arrays, so the endpoints live under `[[endpoints]]`.
#[derive(Deserialize, Debug, Clone)]
pub struct TomlConfig {
    #[serde(alias = "Endpoints")]
    pub endpoints: Vec<EndpointEntry>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct EndpointEntry {
    #[serde(rename = "Url", alias = "url", alias = "URL", default)]
    pub url: String,
    #[serde(rename = "Method", alias = "method", default)]
    pub method: Option<String>,
    #[serde(rename = "Any", alias = "any", default)]
    pub any: bool,
    #[serde(rename = "Fields", alias = "fields", default)]
    pub fields: Option<Vec<FieldEntry>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FieldEntry {
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
    #[serde(rename = "Values", alias = "values", default)]
    pub values: Option<Vec<FieldValue>>,
}

/// A value that can be compared against a response field.
///
/// Configured values and response values are both reduced to a string with
/// [`FieldValue::canonical`] before they are compared, so `5` in the config
/// matches `"5"` in a response and the other way around.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Arrays and objects, compared by their compact JSON text.
    Compound(Value),
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => FieldValue::Number(n.clone()),
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => FieldValue::Compound(value.clone()),
        }
    }
}

impl FieldValue {
    pub fn canonical(&self) -> String {
        match self {
            FieldValue::Null => "null".into(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => canonical_number(n),
            FieldValue::String(s) => s.clone(),
            FieldValue::Compound(value) => value.to_string(),
        }
    }
}

// Floats without a fractional part render as integers, 5.0 becomes "5".
fn canonical_number(n: &Number) -> String {
    if n.is_f64() {
        if let Some(float) = n.as_f64() {
            return float.to_string();
        }
    }

    n.to_string()
}

/// Stringifies a response value the same way configured values are.
pub fn stringify(value: &Value) -> String {
    FieldValue::from(value).canonical()
}

pub fn parse_endpoints(
    contents: &str,
    format: ConfigFormat,
) -> Result<Vec<EndpointEntry>, VaktError> {
    match format {
        ConfigFormat::Json => serde_json::from_str(contents).map_err(VaktError::JsonParsing),
        ConfigFormat::Toml => toml::from_str::<TomlConfig>(contents)
            .map(|config| config.endpoints)
            .map_err(VaktError::TomlParsing),
    }
}
