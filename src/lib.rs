//! Vigil - interactive security assessment shell
//!
//! This crate provides the core of a module-driven assessment console: a
//! declarative module catalog, a registry indexed by path, category, namespace
//! and CVE id, a loader that binds catalog entries to implementations, and a
//! navigator that keeps the shell session consistent.
//!
//! ## Layers
//!
//! 1. Descriptor documents (TOML/JSON, embedded or on disk)
//! 2. `module::registry` - validation and indexing ← catalog
//! 3. `module::loader` - factory table and binding cache ← implementations
//! 4. `session` - context, active module, global options
//! 5. `shell` - parsing, dispatch, rendering, prompt loop
//!
//! ## Design Principles
//!
//! 1. **Catalog is data**: modules are listed without loading any code
//! 2. **Closed capability set**: auxiliary, exploit or cloud, decided at build time
//! 3. **Isolation**: a failing module never takes the shell down
//! 4. **Consistent session**: an instance is active exactly when a path is

pub mod builtin;
pub mod config;
pub mod module;
pub mod session;
pub mod shell;
pub mod utils;

pub use config::ShellConfig;
pub use module::{
    FactoryTable, Implementation, ModuleDescriptor, ModuleError, ModuleHandle, ModuleRegistry,
    RunReport,
};
pub use session::{Navigator, Session, SessionError};
pub use shell::{Dispatcher, Flow};
