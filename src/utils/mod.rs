//! Utility modules for logging and environment handling

pub mod env;
pub mod logging;

// Re-export commonly used items
pub use env::{env_bool, env_opt, env_paths};
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
