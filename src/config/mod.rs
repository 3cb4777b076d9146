//! Configuration management for the shell
//!
//! Handles configuration loading (TOML or JSON), environment overrides and
//! validation. Every field has a default, so an empty file is a valid config.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::module::options::{is_global_option, normalize_key};
use crate::module::registry::{CatalogSources, DescriptorSource};
use crate::utils::env::{env_bool, env_opt, env_paths};

/// Module catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Load the catalog compiled into the binary
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Extra directories scanned for descriptor documents
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            dirs: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "vigil::module=debug"); `RUST_LOG` takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON logs (needs the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Interactive shell configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Print the startup banner
    #[serde(default = "default_true")]
    pub banner: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self { banner: true }
    }
}

/// Top-level shell configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub shell: ReplConfig,

    /// Initial global option values
    #[serde(default)]
    pub globals: BTreeMap<String, String>,
}

impl ShellConfig {
    /// Load a config file; `.json` is read as JSON, anything else as TOML
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ShellConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ShellConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `VIGIL_*` environment overrides
    ///
    /// - `VIGIL_CATALOG_DIRS`: path list appended to `catalog.dirs`
    /// - `VIGIL_NO_BUILTIN`: disables the embedded catalog when truthy
    /// - `VIGIL_LOG`: replaces `logging.filter`
    pub fn apply_env_overrides(&mut self) {
        self.catalog.dirs.extend(env_paths("VIGIL_CATALOG_DIRS"));
        if env_bool("VIGIL_NO_BUILTIN") {
            self.catalog.builtin = false;
        }
        if let Some(filter) = env_opt("VIGIL_LOG") {
            self.logging.filter = Some(filter);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for dir in &self.catalog.dirs {
            if dir.as_os_str().is_empty() {
                return Err(anyhow!("catalog.dirs must not contain empty paths"));
            }
        }
        for key in self.globals.keys() {
            if !is_global_option(key) {
                return Err(anyhow!(
                    "globals.{} is not a global option (expected one of {})",
                    key,
                    crate::module::options::GLOBAL_OPTIONS.join(", ")
                ));
            }
        }
        if let Some(filter) = &self.logging.filter {
            if filter.trim().is_empty() {
                return Err(anyhow!("logging.filter must not be empty when set"));
            }
        }
        Ok(())
    }

    /// Initial globals with normalized keys
    pub fn global_options(&self) -> impl Iterator<Item = (String, &str)> {
        self.globals
            .iter()
            .map(|(key, value)| (normalize_key(key), value.as_str()))
    }

    /// Catalog sources for this config, given the embedded documents
    pub fn catalog_sources(&self, embedded: Vec<DescriptorSource>) -> CatalogSources {
        let sources = if self.catalog.builtin {
            CatalogSources::new().with_embedded(embedded)
        } else {
            CatalogSources::new()
        };
        self.catalog
            .dirs
            .iter()
            .fold(sources, |sources, dir| sources.with_dir(dir))
    }
}
