//! Module loading system
//!
//! Handles factory registration, binding and instantiation.

pub mod loader;

pub use loader::{FactoryTable, ModuleFactory, ModuleLoader};
