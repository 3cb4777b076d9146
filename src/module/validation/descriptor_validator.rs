//! Descriptor validation
//!
//! Structural checks reject a definition; advisory checks only log.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a document or a definition inside it was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{document}: malformed descriptor document: {reason}")]
    MalformedDocument { document: String, reason: String },

    #[error("{document}: definition {definition} missing required fields: {}", fields.join(", "))]
    MissingFields {
        document: String,
        definition: String,
        fields: Vec<String>,
    },

    #[error("{document}: definition {definition} is invalid: {reason}")]
    InvalidDefinition {
        document: String,
        definition: String,
        reason: String,
    },

    #[error("{document}: duplicate module path {path} (already registered from {first})")]
    DuplicatePath {
        document: String,
        path: String,
        first: String,
    },

    #[error("{document}: duplicate module id {id} (already used by {path})")]
    DuplicateId {
        document: String,
        id: String,
        path: String,
    },
}

impl ValidationError {
    /// Name of the document the error was raised for
    pub fn document(&self) -> &str {
        match self {
            ValidationError::MalformedDocument { document, .. }
            | ValidationError::MissingFields { document, .. }
            | ValidationError::InvalidDefinition { document, .. }
            | ValidationError::DuplicatePath { document, .. }
            | ValidationError::DuplicateId { document, .. } => document,
        }
    }
}

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Definition is structurally sound
    Valid,
    /// Definition is missing required fields
    Invalid(Vec<String>),
}

/// Descriptor validator
pub struct DescriptorValidator {
    /// Keys every definition must carry with a non-empty value
    required_fields: Vec<&'static str>,
}

impl Default for DescriptorValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorValidator {
    pub fn new() -> Self {
        Self {
            required_fields: vec!["id", "name", "module_path", "category"],
        }
    }

    /// Check required fields of a raw definition
    pub fn validate(&self, definition: &Map<String, Value>) -> ValidationResult {
        let missing: Vec<String> = self
            .required_fields
            .iter()
            .filter(|field| match definition.get(**field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|field| field.to_string())
            .collect();

        if missing.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(missing)
        }
    }

    /// Log advisory problems that do not reject the definition
    pub fn advise(&self, path: &str, version: &str, cvss_score: Option<f64>) {
        if !path.split('.').all(is_valid_segment) {
            warn!(
                "Module path {} has unusual segments (expected alphanumeric, '-' or '_')",
                path
            );
        }
        if !is_valid_version(version) {
            warn!(
                "Module {} has non-standard version {} (expected major.minor[.patch])",
                path, version
            );
        }
        if let Some(score) = cvss_score {
            if !(0.0..=10.0).contains(&score) {
                warn!("Module {} has CVSS score {} outside 0-10", path, score);
            }
        }
        debug!("Descriptor checks done for {}", path);
    }
}

#[inline]
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Accepts `major.minor[.patch]` with an optional `-prerelease` suffix
#[inline]
fn is_valid_version(version: &str) -> bool {
    let base = version.split(['-', '+']).next().unwrap_or_default();
    let parts: Vec<&str> = base.split('.').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return false;
    }
    parts
        .iter()
        .all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}
