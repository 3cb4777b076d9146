//! Module registry and discovery
//!
//! Handles descriptor discovery, descriptor parsing, and the indexed catalog.

pub mod descriptor;
pub mod discovery;
pub mod index;
pub mod store;

pub use descriptor::{Category, CveInfo, ModuleDescriptor};
pub use discovery::{
    CatalogSources, CollectedSources, DescriptorDiscovery, DescriptorSource, DocumentFormat,
};
pub use index::{
    looks_like_cve, normalize_cve_id, CategorySummary, ModuleRegistry, RegistryStats,
    MODULE_PATH_PREFIX,
};
pub use store::DescriptorStore;
