//! Module loader implementation
//!
//! Turns a registry entry into a live [`ModuleHandle`]. Implementations are
//! found through a [`FactoryTable`] filled at process start; the path to
//! factory binding is cached until the next reload.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::module::handle::{panic_message, ModuleHandle};
use crate::module::registry::{ModuleDescriptor, ModuleRegistry, MODULE_PATH_PREFIX};
use crate::module::traits::{Implementation, ModuleError};

/// Builds a fresh implementation for a descriptor
pub type ModuleFactory =
    Arc<dyn Fn(&ModuleDescriptor) -> Result<Implementation, ModuleError> + Send + Sync>;

/// Registration table: module path to factory
#[derive(Clone, Default)]
pub struct FactoryTable {
    factories: HashMap<String, ModuleFactory>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a module path, replacing any previous one
    pub fn register<F>(&mut self, path: &str, factory: F) -> &mut Self
    where
        F: Fn(&ModuleDescriptor) -> Result<Implementation, ModuleError> + Send + Sync + 'static,
    {
        self.factories.insert(path.to_string(), Arc::new(factory));
        self
    }

    pub fn get(&self, path: &str) -> Option<&ModuleFactory> {
        self.factories.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.factories.contains_key(path)
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryTable")
            .field("paths", &self.paths())
            .finish()
    }
}

/// Module loader for instantiating registered modules
pub struct ModuleLoader {
    factories: FactoryTable,
    /// Cached path to factory bindings
    bindings: HashMap<String, ModuleFactory>,
}

impl ModuleLoader {
    pub fn new(factories: FactoryTable) -> Self {
        Self {
            factories,
            bindings: HashMap::new(),
        }
    }

    pub fn factories(&self) -> &FactoryTable {
        &self.factories
    }

    /// Build a new instance of `target` (path or CVE id), logging failures
    pub fn instantiate(
        &mut self,
        registry: &ModuleRegistry,
        target: &str,
    ) -> Result<ModuleHandle, ModuleError> {
        self.instantiate_inner(registry, target, false)
    }

    /// Same as [`instantiate`](Self::instantiate) with failures logged at debug only
    ///
    /// Used while probing candidate paths during name resolution.
    pub fn instantiate_silent(
        &mut self,
        registry: &ModuleRegistry,
        target: &str,
    ) -> Result<ModuleHandle, ModuleError> {
        self.instantiate_inner(registry, target, true)
    }

    fn instantiate_inner(
        &mut self,
        registry: &ModuleRegistry,
        target: &str,
        silent: bool,
    ) -> Result<ModuleHandle, ModuleError> {
        let result = self.build(registry, target);
        match &result {
            Ok(handle) => info!("Loaded module {} ({})", handle.path(), handle.instance_id()),
            Err(e) if silent => debug!("Could not load {}: {}", target, e),
            Err(e) => warn!("Could not load {}: {}", target, e),
        }
        result
    }

    /// CVE ids resolve through the registry's CVE index, paths through `get`
    fn build(
        &mut self,
        registry: &ModuleRegistry,
        target: &str,
    ) -> Result<ModuleHandle, ModuleError> {
        let target = target.trim();
        let descriptor = registry
            .get(target)
            .cloned()
            .ok_or_else(|| ModuleError::NotRegistered(target.to_string()))?;

        if descriptor.is_namespace {
            return Err(ModuleError::ImplementationMissing(format!(
                "{} (namespace, not loadable)",
                descriptor.path
            )));
        }

        let factory = self
            .bind(&descriptor.path)
            .ok_or_else(|| ModuleError::ImplementationMissing(descriptor.path.clone()))?;

        let implementation = panic::catch_unwind(AssertUnwindSafe(|| factory(&descriptor)))
            .map_err(|payload| panic_message(payload.as_ref()))
            .and_then(|built| built.map_err(|e| e.to_string()))
            .map_err(|reason| ModuleError::LoadFailure {
                path: descriptor.path.clone(),
                reason,
            })?;

        Ok(ModuleHandle::new(descriptor, implementation))
    }

    /// Resolve the factory for a canonical path, caching the binding
    fn bind(&mut self, path: &str) -> Option<ModuleFactory> {
        if let Some(factory) = self.bindings.get(path) {
            return Some(factory.clone());
        }
        let factory = self
            .factories
            .get(path)
            .or_else(|| self.factories.get(&format!("{}{}", MODULE_PATH_PREFIX, path)))?
            .clone();
        debug!("Bound implementation for {}", path);
        self.bindings.insert(path.to_string(), factory.clone());
        Some(factory)
    }

    pub fn is_bound(&self, path: &str) -> bool {
        self.bindings.contains_key(path)
    }

    /// Drop cached bindings; the next load binds again
    pub fn invalidate(&mut self) {
        debug!("Dropping {} cached module bindings", self.bindings.len());
        self.bindings.clear();
    }
}
