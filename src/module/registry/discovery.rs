//! Descriptor discovery
//!
//! Collects descriptor documents from the embedded catalog and from catalog
//! directories on disk.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::module::traits::ModuleError;
use crate::module::validation::ValidationError;

/// Document syntax of a descriptor source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    /// Format from a file extension; `None` for files that are not descriptors
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Some(DocumentFormat::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(DocumentFormat::Json),
            _ => None,
        }
    }
}

/// One descriptor document, named for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSource {
    pub name: String,
    pub format: DocumentFormat,
    pub contents: String,
}

impl DescriptorSource {
    pub fn toml(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: DocumentFormat::Toml,
            contents: contents.into(),
        }
    }

    pub fn json(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: DocumentFormat::Json,
            contents: contents.into(),
        }
    }

    /// Read a descriptor file; the format follows the extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            ModuleError::OperationError(format!("Not a descriptor document: {}", path.display()))
        })?;
        let contents = fs::read_to_string(path)?;
        Ok(Self {
            name: path.display().to_string(),
            format,
            contents,
        })
    }
}

/// Catalog directory scanner
pub struct DescriptorDiscovery {
    catalog_dir: PathBuf,
}

impl DescriptorDiscovery {
    pub fn new<P: AsRef<Path>>(catalog_dir: P) -> Self {
        Self {
            catalog_dir: catalog_dir.as_ref().to_path_buf(),
        }
    }

    /// Every `*.toml` / `*.json` file under the directory, in path order
    ///
    /// Only a missing or unlistable directory is an error. A file that cannot
    /// be read is reported in [`CollectedSources::unreadable`] and skipped.
    pub fn discover_sources(&self) -> Result<CollectedSources, ModuleError> {
        debug!("Scanning catalog directory {:?}", self.catalog_dir);

        if !self.catalog_dir.is_dir() {
            return Err(ModuleError::OperationError(format!(
                "Catalog directory does not exist: {}",
                self.catalog_dir.display()
            )));
        }

        let mut files = Vec::new();
        collect_files(&self.catalog_dir, &mut files)?;
        files.sort();

        let mut collected = CollectedSources::default();
        for path in files {
            match DescriptorSource::from_file(&path) {
                Ok(source) => collected.documents.push(source),
                Err(e) => {
                    warn!("Skipping unreadable descriptor {}: {}", path.display(), e);
                    collected.unreadable.push(ValidationError::MalformedDocument {
                        document: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(collected)
    }
}

/// Documents gathered from a catalog, plus the files that could not be read
#[derive(Debug, Clone, Default)]
pub struct CollectedSources {
    pub documents: Vec<DescriptorSource>,
    pub unreadable: Vec<ValidationError>,
}

impl CollectedSources {
    fn extend(&mut self, other: CollectedSources) {
        self.documents.extend(other.documents);
        self.unreadable.extend(other.unreadable);
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ModuleError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ModuleError::OperationError(format!(
            "Failed to read catalog directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries {
        let path = entry
            .map_err(|e| {
                ModuleError::OperationError(format!("Failed to read directory entry: {}", e))
            })?
            .path();

        if path.is_dir() {
            collect_files(&path, files)?;
        } else if DocumentFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    Ok(())
}

/// Where descriptor documents come from: the embedded catalog plus directories
///
/// Kept by the navigator so `reload` can collect the same sources again.
#[derive(Debug, Clone, Default)]
pub struct CatalogSources {
    embedded: Vec<DescriptorSource>,
    dirs: Vec<PathBuf>,
}

impl CatalogSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedded(mut self, sources: Vec<DescriptorSource>) -> Self {
        self.embedded.extend(sources);
        self
    }

    pub fn with_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.dirs.push(dir.as_ref().to_path_buf());
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Embedded documents first, then each directory in configured order
    pub fn collect(&self) -> Result<CollectedSources, ModuleError> {
        let mut collected = CollectedSources {
            documents: self.embedded.clone(),
            unreadable: Vec::new(),
        };
        for dir in &self.dirs {
            collected.extend(DescriptorDiscovery::new(dir).discover_sources()?);
        }
        info!(
            "Collected {} descriptor documents ({} unreadable)",
            collected.documents.len(),
            collected.unreadable.len()
        );
        Ok(collected)
    }
}
