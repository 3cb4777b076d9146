//! Module system traits and interfaces
//!
//! Defines the capability set a module implementation can provide and the
//! result types that flow back to the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::module::options::OptionSet;

/// Outcome of a single module run
///
/// A run that completes but does not achieve its goal (target not vulnerable,
/// required options missing) is still `Ok(RunReport)` with `success == false`.
/// Hard failures inside an implementation surface as `ModuleError` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Failure that still carries partial data for the operator
    pub fn failure_with_data(error: impl Into<String>, data: Value) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(error.into()),
        }
    }
}

/// Severity of a cloud misconfiguration finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// A cloud resource discovered during enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind, e.g. `instance` or `security_group`
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Provider-specific attributes kept as a JSON object
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

/// A misconfiguration detected on a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub resource_id: String,
    pub title: String,
    pub detail: String,
}

/// Plain executable module (enumeration, utilities)
pub trait AuxiliaryModule {
    fn execute(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError>;
}

/// Vulnerability module with a separate non-destructive check
pub trait ExploitModule {
    /// Check the target. `false` means the target does not look vulnerable
    /// and `exploit` will not be called.
    fn check(&mut self, options: &OptionSet) -> Result<bool, ModuleError>;

    fn exploit(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError>;
}

/// Cloud misconfiguration scanner
///
/// `enumerate_resources` always runs before `check_misconfigurations` within a
/// single run, so implementations may keep the enumerated inventory around.
pub trait CloudModule {
    /// Provider label reported in the aggregated result (`aws`, `azure`, ...)
    fn provider(&self) -> &str;

    fn enumerate_resources(&mut self, options: &OptionSet) -> Result<Vec<Resource>, ModuleError>;

    fn check_misconfigurations(&mut self, options: &OptionSet) -> Result<Vec<Finding>, ModuleError>;

    /// Masked summary of the credentials the run was given, if the provider takes any
    fn credentials(&self, _options: &OptionSet) -> Option<Value> {
        None
    }
}

/// The closed set of module capabilities
///
/// Chosen once when the factory builds the implementation; `ModuleHandle::run`
/// dispatches on it.
pub enum Implementation {
    Auxiliary(Box<dyn AuxiliaryModule>),
    Exploit(Box<dyn ExploitModule>),
    Cloud(Box<dyn CloudModule>),
}

impl Implementation {
    pub fn kind(&self) -> &'static str {
        match self {
            Implementation::Auxiliary(_) => "auxiliary",
            Implementation::Exploit(_) => "exploit",
            Implementation::Cloud(_) => "cloud",
        }
    }
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Implementation::{}", self.kind())
    }
}

/// Module error types
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module not registered: {0}")]
    NotRegistered(String),

    #[error("No implementation available for {0}")]
    ImplementationMissing(String),

    #[error("Failed to load module {path}: {reason}")]
    LoadFailure { path: String, reason: String },

    #[error("Module operation failed: {0}")]
    OperationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ModuleError {
    fn from(e: serde_json::Error) -> Self {
        ModuleError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_report_serialization_skips_empty_fields() {
        let report = RunReport::failure("Invalid options");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, json!({"success": false, "error": "Invalid options"}));

        let report = RunReport::success(json!({"lines": 3}));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, json!({"success": true, "data": {"lines": 3}}));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn test_module_error_display() {
        let err = ModuleError::LoadFailure {
            path: "cve.demo".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to load module cve.demo: boom");
    }
}
