//! Module descriptors
//!
//! A descriptor is the immutable catalog record for one module or namespace,
//! built from a definition inside a descriptor document:
//!
//! ```toml
//! [[modules]]
//! id = "CVE-2021-42013"
//! name = "Apache HTTP Server 2.4.50 Path Traversal"
//! module_path = "cve.2021.apache_path_traversal"
//! category = "cve"
//! required_options = ["RHOST"]
//!
//! [modules.options]
//! RHOST = ""
//! RPORT = 80
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::module::options::{OptionSchema, OptionSpec, OptionType, OptionValue};
use crate::module::validation::{DescriptorValidator, ValidationError, ValidationResult};

/// Top-level module categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cve,
    Cloud,
    Enumeration,
    Platforms,
    Misc,
}

impl Category {
    /// Catalog order used for the root listing
    pub const ALL: [Category; 5] = [
        Category::Cve,
        Category::Cloud,
        Category::Enumeration,
        Category::Platforms,
        Category::Misc,
    ];

    /// Resolve a category name or alias; `None` for unknown names
    pub fn lookup(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cve" | "vuln" => Some(Category::Cve),
            "cloud" => Some(Category::Cloud),
            "enumeration" => Some(Category::Enumeration),
            "platforms" => Some(Category::Platforms),
            "misc" | "aux" | "auxiliary" => Some(Category::Misc),
            _ => None,
        }
    }

    /// Category for a descriptor; unknown names fall into `misc`
    pub fn normalize(name: &str) -> Self {
        Self::lookup(name).unwrap_or(Category::Misc)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cve => "cve",
            Category::Cloud => "cloud",
            Category::Enumeration => "enumeration",
            Category::Platforms => "platforms",
            Category::Misc => "misc",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::Cve => "CVE exploit modules",
            Category::Cloud => "Cloud platform security (AWS, Azure, GCP)",
            Category::Enumeration => "Reconnaissance and enumeration tools",
            Category::Platforms => "Platform-specific exploits and tools",
            Category::Misc => "Miscellaneous modules",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vulnerability metadata carried by CVE modules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CveInfo {
    pub cve_id: Option<String>,
    pub cvss_score: Option<f64>,
    pub rank: Option<String>,
    pub disclosure_date: Option<String>,
}

impl CveInfo {
    fn is_empty(&self) -> bool {
        self.cve_id.is_none()
            && self.cvss_score.is_none()
            && self.rank.is_none()
            && self.disclosure_date.is_none()
    }
}

/// Immutable catalog record for a module or namespace
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub id: String,
    /// Dot-delimited unique key
    pub path: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub category: Category,
    pub subcategory: Option<String>,
    pub is_namespace: bool,
    pub options: Arc<OptionSchema>,
    pub cve: Option<CveInfo>,
    pub references: Vec<String>,
    pub affected_versions: Vec<String>,
    /// Document this descriptor was loaded from
    pub source: String,
}

/// Wire shape of a definition once required fields are known to exist
#[derive(Debug, Deserialize)]
struct RawDefinition {
    id: String,
    name: String,
    module_path: String,
    category: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    is_namespace: bool,
    #[serde(default)]
    options: BTreeMap<String, Value>,
    #[serde(default, alias = "required")]
    required_options: Vec<String>,
    #[serde(default)]
    cve_id: Option<String>,
    #[serde(default)]
    cvss_score: Option<f64>,
    #[serde(default)]
    rank: Option<String>,
    #[serde(default)]
    disclosure_date: Option<String>,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    affected_versions: Vec<String>,
}

impl ModuleDescriptor {
    /// Build a descriptor from one raw definition of `document`
    ///
    /// `index` labels the definition in errors when it has no usable id.
    pub fn from_definition(
        definition: Map<String, Value>,
        document: &str,
        index: usize,
    ) -> Result<Self, ValidationError> {
        let label = definition
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));

        let validator = DescriptorValidator::new();
        if let ValidationResult::Invalid(fields) = validator.validate(&definition) {
            return Err(ValidationError::MissingFields {
                document: document.to_string(),
                definition: label,
                fields,
            });
        }

        let invalid = |reason: String| ValidationError::InvalidDefinition {
            document: document.to_string(),
            definition: label.clone(),
            reason,
        };

        let raw: RawDefinition =
            serde_json::from_value(Value::Object(definition)).map_err(|e| invalid(e.to_string()))?;

        let version = match raw.version {
            None | Some(Value::Null) => "1.0".to_string(),
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(invalid(format!("version must be a string, got {}", other))),
        };

        let options = parse_schema(&raw.options, &raw.required_options).map_err(invalid)?;

        let cve = CveInfo {
            cve_id: raw.cve_id.map(|id| id.trim().to_ascii_uppercase()),
            cvss_score: raw.cvss_score,
            rank: raw.rank,
            disclosure_date: raw.disclosure_date,
        };

        let path = raw.module_path.trim().to_string();
        validator.advise(&path, &version, cve.cvss_score);

        Ok(ModuleDescriptor {
            id: raw.id.trim().to_string(),
            path,
            name: raw.name,
            description: raw.description.unwrap_or_default(),
            author: raw.author.unwrap_or_else(|| "Unknown".to_string()),
            version,
            category: Category::normalize(&raw.category),
            subcategory: raw.subcategory,
            is_namespace: raw.is_namespace,
            options: Arc::new(options),
            cve: if cve.is_empty() { None } else { Some(cve) },
            references: raw.references,
            affected_versions: raw.affected_versions,
            source: document.to_string(),
        })
    }

    /// CVE id of this descriptor, from `cve_id` or a `CVE-` prefixed `id`
    pub fn cve_id(&self) -> Option<&str> {
        self.cve
            .as_ref()
            .and_then(|cve| cve.cve_id.as_deref())
            .or_else(|| {
                if self.id.to_ascii_uppercase().starts_with("CVE-") {
                    Some(self.id.as_str())
                } else {
                    None
                }
            })
    }

    /// Last path segment
    pub fn short_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Turn the `options` table of a definition into a typed schema
///
/// An entry is either a bare default whose type is inferred once here, or a
/// table with `type`, `default` and `description`.
fn parse_schema(
    options: &BTreeMap<String, Value>,
    required: &[String],
) -> Result<OptionSchema, String> {
    let mut schema = OptionSchema::new();

    for (name, entry) in options {
        let spec = match entry {
            Value::Object(table) if table.contains_key("type") || table.contains_key("default") => {
                explicit_spec(name, table)?
            }
            other => {
                let default = OptionValue::from_json(other)
                    .ok_or_else(|| format!("option {} has an unsupported default", name))?;
                OptionSpec::inferred(name, default)
            }
        };
        schema.insert(spec);
    }

    for name in required {
        schema.require(name);
    }

    Ok(schema)
}

fn explicit_spec(name: &str, table: &Map<String, Value>) -> Result<OptionSpec, String> {
    let default = match table.get("default") {
        Some(value) => Some(
            OptionValue::from_json(value)
                .ok_or_else(|| format!("option {} has an unsupported default", name))?,
        ),
        None => None,
    };

    let kind = match table.get("type").and_then(Value::as_str) {
        Some(type_name) => OptionType::parse(type_name)
            .ok_or_else(|| format!("option {} has unknown type {}", name, type_name))?,
        None => default
            .as_ref()
            .map(OptionValue::kind)
            .unwrap_or(OptionType::String),
    };

    let spec = match default {
        Some(value) => {
            let shown = value.to_string();
            let value = value.convert_to(kind).ok_or_else(|| {
                format!("option {} default '{}' is not a valid {}", name, shown, kind)
            })?;
            OptionSpec {
                kind,
                ..OptionSpec::inferred(name, value)
            }
        }
        None => OptionSpec::typed(name, kind),
    };

    let description = table
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(spec.with_description(description))
}
