//! Shell session state
//!
//! One [`Session`] exists per shell run. It records where the operator is in
//! the namespace tree, which module is active, and the global option store.
//! The [`Navigator`] owns it and is the only thing that mutates it.

pub mod navigator;

pub use navigator::{
    BackOutcome, Listing, ModuleInfo, Navigator, OptionRow, OptionSource, ReloadSummary,
    SetOutcome, UseOutcome,
};

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::module::options::{normalize_key, OptionError, OptionSet, OptionValue};
use crate::module::{ModuleError, ModuleHandle};

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Option(#[from] OptionError),

    #[error("No module loaded. Use 'use <module>' first")]
    NoActiveModule,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Module {path} failed: {message}")]
    RunFailure { path: String, message: String },

    #[error("Reload failed, keeping the current catalog: {0}")]
    ReloadFailed(String),

    #[error("Module catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

/// The active module: its live handle plus the session's working copy of its options
#[derive(Debug)]
pub struct ActiveModule {
    handle: ModuleHandle,
    options: OptionSet,
}

impl ActiveModule {
    pub fn path(&self) -> &str {
        self.handle.path()
    }

    pub fn handle(&self) -> &ModuleHandle {
        &self.handle
    }

    /// Working copy, re-applied onto the handle before every run
    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    fn set_option(&mut self, key: &str, raw: &str) -> Result<OptionValue, OptionError> {
        let value = self.handle.set_option(key, raw)?;
        self.options.set_value(key, value.clone())?;
        Ok(value)
    }

    fn handle_mut(&mut self) -> &mut ModuleHandle {
        &mut self.handle
    }

    /// Push every working-copy value onto the live handle
    fn sync(&mut self) -> Result<(), OptionError> {
        for (key, value) in self.options.iter() {
            self.handle.apply_option(key, value.clone())?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Session {
    /// Empty at root, otherwise a category name or namespace path
    context: String,
    active: Option<ActiveModule>,
    global_options: BTreeMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
        debug!("Context is now '{}'", self.context);
    }

    /// Drop the last context segment; `false` when already at root
    pub fn pop_context(&mut self) -> bool {
        if self.context.is_empty() {
            return false;
        }
        let parent = match self.context.rfind('.') {
            Some(index) => self.context[..index].to_string(),
            None => String::new(),
        };
        self.set_context(parent);
        true
    }

    pub fn active(&self) -> Option<&ActiveModule> {
        self.active.as_ref()
    }

    pub fn active_path(&self) -> Option<&str> {
        self.active.as_ref().map(ActiveModule::path)
    }

    pub fn global_options(&self) -> &BTreeMap<String, String> {
        &self.global_options
    }

    pub fn global(&self, key: &str) -> Option<&str> {
        self.global_options.get(&normalize_key(key)).map(String::as_str)
    }

    /// Make `handle` the active module, returning the path it replaced
    ///
    /// The working copy starts from the schema defaults; every global value the
    /// schema declares is then overlaid onto both the copy and the handle.
    pub fn activate(&mut self, mut handle: ModuleHandle) -> Option<String> {
        let mut options = handle.options().clone();
        for (key, raw) in &self.global_options {
            if !options.schema().contains(key) {
                continue;
            }
            match options.set_raw(key, raw) {
                Ok(value) => {
                    if let Err(e) = handle.apply_option(key, value) {
                        warn!("Global {} not applied to {}: {}", key, handle.path(), e);
                    }
                }
                Err(e) => warn!("Global {} not applied to {}: {}", key, handle.path(), e),
            }
        }
        let replaced = self.active.take().map(|old| old.path().to_string());
        self.active = Some(ActiveModule { handle, options });
        replaced
    }

    /// Unload the active module; global options are kept
    pub fn deactivate(&mut self) -> Option<String> {
        self.active.take().map(|old| old.path().to_string())
    }

    /// Store a global; returns whether the active module took the value too
    fn set_global(&mut self, key: &str, raw: &str) -> Result<bool, OptionError> {
        let key = normalize_key(key);
        self.global_options.insert(key.clone(), raw.to_string());
        match self.active.as_mut() {
            Some(active) if active.options().schema().contains(&key) => {
                active.set_option(&key, raw)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_module_option(&mut self, key: &str, raw: &str) -> Result<OptionValue, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActiveModule)?;
        Ok(active.set_option(key, raw)?)
    }

    fn active_mut(&mut self) -> Option<&mut ActiveModule> {
        self.active.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_context() {
        let mut session = Session::new();
        assert!(!session.pop_context());
        session.set_context("cloud.aws");
        assert!(session.pop_context());
        assert_eq!(session.context(), "cloud");
        assert!(session.pop_context());
        assert_eq!(session.context(), "");
    }

    #[test]
    fn test_set_global_without_module() {
        let mut session = Session::new();
        assert_eq!(session.set_global("aws_region", "eu-west-1"), Ok(false));
        assert_eq!(session.global("AWS_REGION"), Some("eu-west-1"));
        assert!(matches!(
            session.set_module_option("RHOST", "x"),
            Err(SessionError::NoActiveModule)
        ));
    }
}
