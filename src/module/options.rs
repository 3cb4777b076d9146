//! Typed module options
//!
//! Every option a module exposes is declared up front in an [`OptionSchema`]:
//! name, type, default and description. User input arrives as text and is
//! coerced against the declared type, so a module never sees a value of the
//! wrong shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Options shared across modules and kept in the session-wide store
pub const GLOBAL_OPTIONS: [&str; 5] = [
    "AWS_PROFILE",
    "AWS_REGION",
    "ACCESS_KEY",
    "SECRET_KEY",
    "SESSION_TOKEN",
];

const TRUTHY: [&str; 5] = ["true", "1", "yes", "y", "on"];
const SENSITIVE_MARKERS: [&str; 4] = ["PASSWORD", "KEY", "SECRET", "TOKEN"];

/// Placeholder shown for empty option values
pub const NOT_SET: &str = "<not set>";

/// Option keys are case-insensitive and stored upper-case
pub fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

pub fn is_global_option(key: &str) -> bool {
    let key = normalize_key(key);
    GLOBAL_OPTIONS.contains(&key.as_str())
}

/// Render a value for display, hiding anything that looks like a credential
pub fn mask_value(key: &str, value: &str) -> String {
    if value.trim().is_empty() {
        return NOT_SET.to_string();
    }
    let key = normalize_key(key);
    if SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker)) {
        "***".to_string()
    } else {
        value.to_string()
    }
}

/// Declared type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Bool,
    Integer,
    Float,
    String,
}

impl OptionType {
    /// Parse a type name from a descriptor document
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Some(OptionType::Bool),
            "int" | "integer" => Some(OptionType::Integer),
            "float" | "number" => Some(OptionType::Float),
            "str" | "string" => Some(OptionType::String),
            _ => None,
        }
    }

    fn zero_value(self) -> OptionValue {
        match self {
            OptionType::Bool => OptionValue::Bool(false),
            OptionType::Integer => OptionValue::Integer(0),
            OptionType::Float => OptionValue::Float(0.0),
            OptionType::String => OptionValue::String(String::new()),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionType::Bool => "bool",
            OptionType::Integer => "integer",
            OptionType::Float => "float",
            OptionType::String => "string",
        };
        f.write_str(name)
    }
}

/// A typed option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl OptionValue {
    pub fn kind(&self) -> OptionType {
        match self {
            OptionValue::Bool(_) => OptionType::Bool,
            OptionValue::Integer(_) => OptionType::Integer,
            OptionValue::Float(_) => OptionType::Float,
            OptionValue::String(_) => OptionType::String,
        }
    }

    /// Coerce operator input into a value of `kind`
    pub fn coerce(kind: OptionType, raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        match kind {
            OptionType::Bool => Ok(OptionValue::Bool(
                TRUTHY.contains(&trimmed.to_ascii_lowercase().as_str()),
            )),
            OptionType::Integer => trimmed
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|e| e.to_string()),
            OptionType::Float => trimmed
                .parse::<f64>()
                .map(OptionValue::Float)
                .map_err(|e| e.to_string()),
            OptionType::String => Ok(OptionValue::String(raw.to_string())),
        }
    }

    /// Type a document value; arrays and tables are not option values
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(OptionValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(OptionValue::Integer)
                .or_else(|| n.as_f64().map(OptionValue::Float)),
            Value::String(s) => Some(OptionValue::String(s.clone())),
            Value::Null => Some(OptionValue::String(String::new())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert to another declared type without going through text, where lossless
    pub fn convert_to(self, kind: OptionType) -> Option<Self> {
        match (self, kind) {
            (value, kind) if value.kind() == kind => Some(value),
            (OptionValue::Integer(i), OptionType::Float) => Some(OptionValue::Float(i as f64)),
            (OptionValue::String(s), kind) => OptionValue::coerce(kind, &s).ok(),
            (value, OptionType::String) => Some(OptionValue::String(value.to_string())),
            _ => None,
        }
    }

    /// Empty or whitespace-only strings count as unset
    pub fn is_blank(&self) -> bool {
        matches!(self, OptionValue::String(s) if s.trim().is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Float(f) => Some(*f),
            OptionValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::String(s) => f.write_str(s),
        }
    }
}

/// Declaration of one option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionType,
    pub default: OptionValue,
    #[serde(default)]
    pub description: String,
}

impl OptionSpec {
    /// Spec whose type follows its default
    pub fn inferred(name: &str, default: OptionValue) -> Self {
        Self {
            name: normalize_key(name),
            kind: default.kind(),
            default,
            description: String::new(),
        }
    }

    /// Spec with an explicit type and no meaningful default
    pub fn typed(name: &str, kind: OptionType) -> Self {
        Self {
            name: normalize_key(name),
            kind,
            default: kind.zero_value(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The option declarations of one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSchema {
    specs: BTreeMap<String, OptionSpec>,
    required: BTreeSet<String>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: OptionSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Mark an option as required; undeclared names become empty string options
    pub fn require(&mut self, name: &str) {
        let name = normalize_key(name);
        if !self.specs.contains_key(&name) {
            self.insert(OptionSpec::typed(&name, OptionType::String));
        }
        self.required.insert(name);
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.get(&normalize_key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(&normalize_key(name))
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(&normalize_key(name))
    }

    pub fn specs(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.values()
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Option errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionError {
    #[error("Invalid option: {0}")]
    UnknownOption(String),

    #[error("Invalid value '{value}' for {key} (expected {expected}): {reason}")]
    InvalidValue {
        key: String,
        expected: OptionType,
        value: String,
        reason: String,
    },
}

/// Current values for a schema
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSet {
    schema: Arc<OptionSchema>,
    values: BTreeMap<String, OptionValue>,
}

impl OptionSet {
    /// Seed every declared option with its default
    pub fn from_schema(schema: Arc<OptionSchema>) -> Self {
        let values = schema
            .specs()
            .map(|spec| (spec.name.clone(), spec.default.clone()))
            .collect();
        Self { schema, values }
    }

    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(&normalize_key(key))
    }

    /// Text form of a value; empty when the option is unknown
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(|v| v.to_string()).unwrap_or_default()
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(OptionValue::as_i64)
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(OptionValue::as_f64)
    }

    /// Coerce `raw` to the declared type and store it
    pub fn set_raw(&mut self, key: &str, raw: &str) -> Result<OptionValue, OptionError> {
        let key = normalize_key(key);
        let spec = self
            .schema
            .get(&key)
            .ok_or_else(|| OptionError::UnknownOption(key.clone()))?;
        let value = OptionValue::coerce(spec.kind, raw).map_err(|reason| {
            OptionError::InvalidValue {
                key: key.clone(),
                expected: spec.kind,
                value: raw.to_string(),
                reason,
            }
        })?;
        self.values.insert(key, value.clone());
        Ok(value)
    }

    /// Store an already-typed value; the type must match the declaration
    pub fn set_value(&mut self, key: &str, value: OptionValue) -> Result<(), OptionError> {
        let key = normalize_key(key);
        let spec = self
            .schema
            .get(&key)
            .ok_or_else(|| OptionError::UnknownOption(key.clone()))?;
        let raw = value.to_string();
        let value = value
            .convert_to(spec.kind)
            .ok_or_else(|| OptionError::InvalidValue {
                key: key.clone(),
                expected: spec.kind,
                value: raw,
                reason: "type mismatch".to_string(),
            })?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Required options whose value is unset, in name order
    pub fn missing_required(&self) -> Vec<String> {
        self.schema
            .required()
            .filter(|name| self.values.get(*name).map_or(true, OptionValue::is_blank))
            .map(str::to_string)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
