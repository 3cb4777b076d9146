//! Logging initialization
//!
//! Logs go to stderr so they never interleave with shell output on stdout.
//! Filter precedence:
//! - `RUST_LOG` when set
//! - then the filter from config or the command line
//! - then [`DEFAULT_FILTER`]
//!
//! # Usage
//! ```rust,no_run
//! use vigil::utils::init_logging;
//!
//! init_logging(Some("vigil=debug"));
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Quiet by default: the shell reports outcomes itself
pub const DEFAULT_FILTER: &str = "warn";

fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Initialize human-readable logging
pub fn init_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()), // Respect NO_COLOR standard
        )
        .with(build_filter(filter))
        .init();
}

/// Initialize logging with JSON output, for scripted sessions
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .init();
}

/// Initialize logging from the shell configuration
///
/// `json_format` without the `json-logging` feature falls back to plain output.
pub fn init_logging_from_config(config: &crate::config::LoggingConfig) {
    let filter = config.filter.as_deref();

    if config.json_format {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
