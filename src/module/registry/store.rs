//! Descriptor store
//!
//! Parses descriptor documents into a fresh [`ModuleRegistry`]. Bad documents
//! and bad definitions are reported and skipped; loading never aborts.

use serde_json::Value;
use tracing::{info, warn};

use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::registry::discovery::{CollectedSources, DescriptorSource, DocumentFormat};
use crate::module::registry::index::ModuleRegistry;
use crate::module::validation::ValidationError;

pub struct DescriptorStore;

impl DescriptorStore {
    /// Build a registry from every definition in `sources`
    pub fn load(sources: &[DescriptorSource]) -> (ModuleRegistry, Vec<ValidationError>) {
        let mut errors = Vec::new();
        let mut descriptors = Vec::new();

        for source in sources {
            let definitions = match Self::parse_document(source) {
                Ok(definitions) => definitions,
                Err(e) => {
                    warn!("Skipping descriptor document: {}", e);
                    errors.push(e);
                    continue;
                }
            };

            for (index, entry) in definitions.into_iter().enumerate() {
                let parsed = match entry {
                    Value::Object(definition) => {
                        ModuleDescriptor::from_definition(definition, &source.name, index)
                    }
                    _ => Err(ValidationError::InvalidDefinition {
                        document: source.name.clone(),
                        definition: format!("#{}", index),
                        reason: "definition must be a table".to_string(),
                    }),
                };
                match parsed {
                    Ok(descriptor) => descriptors.push(descriptor),
                    Err(e) => {
                        warn!("Skipping module definition: {}", e);
                        errors.push(e);
                    }
                }
            }
        }

        let (registry, duplicates) = ModuleRegistry::from_descriptors(descriptors);
        errors.extend(duplicates);

        info!(
            "Loaded {} descriptors from {} documents ({} rejected)",
            registry.len(),
            sources.len(),
            errors.len()
        );
        (registry, errors)
    }

    /// [`load`](Self::load) over collected sources; unreadable files are reported first
    pub fn load_collected(collected: &CollectedSources) -> (ModuleRegistry, Vec<ValidationError>) {
        let (registry, errors) = Self::load(&collected.documents);
        let mut all = collected.unreadable.clone();
        all.extend(errors);
        (registry, all)
    }

    /// Split a document into its raw definition entries
    pub fn parse_document(source: &DescriptorSource) -> Result<Vec<Value>, ValidationError> {
        let malformed = |reason: String| ValidationError::MalformedDocument {
            document: source.name.clone(),
            reason,
        };

        let document = match source.format {
            DocumentFormat::Toml => toml::from_str::<toml::Table>(&source.contents)
                .map(|table| toml_to_json(toml::Value::Table(table)))
                .map_err(|e| malformed(e.to_string()))?,
            DocumentFormat::Json => serde_json::from_str::<Value>(&source.contents)
                .map_err(|e| malformed(e.to_string()))?,
        };

        let modules = match document {
            Value::Object(mut root) => root
                .remove("modules")
                .ok_or_else(|| malformed("missing top-level 'modules' list".to_string()))?,
            _ => return Err(malformed("document root must be a table".to_string())),
        };

        match modules {
            Value::Array(entries) => Ok(entries),
            _ => Err(malformed("'modules' must be a list".to_string())),
        }
    }
}

/// TOML values mapped onto JSON; datetimes become their RFC 3339 text
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
[[modules]]
id = "CVE-2021-41773"
name = "Apache 2.4.49 Path Traversal"
module_path = "cve.2021.apache_2449"
category = "CVE"
disclosure_date = 2021-10-05
required_options = ["RHOST"]

[modules.options]
RHOST = ""
RPORT = 80

[[modules]]
id = "broken"
name = "Broken"
"#;

    #[test]
    fn test_load_skips_bad_definitions() {
        let (registry, errors) =
            DescriptorStore::load(&[DescriptorSource::toml("cve.toml", DOCUMENT)]);
        assert_eq!(registry.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::MissingFields { definition, .. } if definition == "broken"
        ));

        let descriptor = registry.get("CVE-2021-41773").unwrap();
        assert_eq!(descriptor.path, "cve.2021.apache_2449");
        assert_eq!(
            descriptor.cve.as_ref().and_then(|c| c.disclosure_date.clone()),
            Some("2021-10-05".to_string())
        );
    }

    #[test]
    fn test_malformed_document_reported() {
        let (registry, errors) = DescriptorStore::load(&[
            DescriptorSource::toml("bad.toml", "[[modules]\nid ="),
            DescriptorSource::json("bad.json", "{\"items\": []}"),
        ]);
        assert!(registry.is_empty());
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::MalformedDocument { .. })));
    }

    #[test]
    fn test_json_document() {
        let json = r#"{"modules": [
            {"id": "hello", "name": "Hello", "module_path": "misc.hello", "category": "misc",
             "options": {"TIMES": 2}}
        ]}"#;
        let (registry, errors) = DescriptorStore::load(&[DescriptorSource::json("m.json", json)]);
        assert!(errors.is_empty());
        let descriptor = registry.get("misc.hello").unwrap();
        assert_eq!(descriptor.options.len(), 1);
    }

    #[test]
    fn test_non_table_definition_rejected() {
        let json = r#"{"modules": [
            1,
            {"id": "hello", "name": "Hello", "module_path": "misc.hello", "category": "misc"}
        ]}"#;
        let (registry, errors) = DescriptorStore::load(&[DescriptorSource::json("x.json", json)]);
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidDefinition { definition, .. } if definition == "#0"
        ));
    }
}
