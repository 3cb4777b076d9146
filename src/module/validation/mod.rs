//! Module validation framework
//!
//! Descriptor definitions are checked here before they reach the registry.

pub mod descriptor_validator;

pub use descriptor_validator::{DescriptorValidator, ValidationError, ValidationResult};
