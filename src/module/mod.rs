//! Module system
//!
//! Modules are described declaratively (descriptor documents), indexed in a
//! [`ModuleRegistry`], and instantiated on demand by the [`ModuleLoader`].
//!
//! ## Architecture
//!
//! - **Descriptors**: immutable catalog records, validated at load time
//! - **Registry**: path, category, namespace and CVE indexes over descriptors
//! - **Loader**: factory registration table with a cached path binding
//! - **Handles**: one live implementation plus its typed options
//! - **Capabilities**: auxiliary, exploit (check then exploit) and cloud (enumerate then audit)

pub mod handle;
pub mod loader;
pub mod options;
pub mod registry;
pub mod traits;
pub mod validation;

pub use handle::ModuleHandle;
pub use loader::{FactoryTable, ModuleFactory, ModuleLoader};
pub use options::{OptionError, OptionSchema, OptionSet, OptionSpec, OptionType, OptionValue};
pub use registry::{
    CatalogSources, Category, DescriptorSource, DescriptorStore, ModuleDescriptor, ModuleRegistry,
};
pub use traits::{
    AuxiliaryModule, CloudModule, ExploitModule, Finding, Implementation, ModuleError, Resource,
    RunReport, Severity,
};
pub use validation::ValidationError;
