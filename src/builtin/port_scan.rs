//! TCP connect scanner

use rayon::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

use crate::module::{AuxiliaryModule, ModuleError, OptionSet, RunReport};

/// Worker threads when `THREADS` is unset
const DEFAULT_THREADS: i64 = 64;

pub struct TcpPortScan;

/// Parse `22,80,8000-8010` into a sorted, de-duplicated port list
pub fn parse_ports(spec: &str) -> Result<Vec<u16>, String> {
    let mut ports = BTreeSet::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                if start > end {
                    return Err(format!("invalid port range {}", part));
                }
                ports.extend(start..=end);
            }
            None => {
                ports.insert(parse_port(part)?);
            }
        }
    }
    if ports.is_empty() {
        return Err("no ports given".to_string());
    }
    Ok(ports.into_iter().collect())
}

fn parse_port(text: &str) -> Result<u16, String> {
    match text.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port {}", text.trim())),
        Ok(port) => Ok(port),
    }
}

fn is_open(addr: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&addr, timeout).is_ok()
}

impl AuxiliaryModule for TcpPortScan {
    fn execute(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError> {
        let host = options.text("RHOST");
        let ports = match parse_ports(&options.text("PORTS")) {
            Ok(ports) => ports,
            Err(reason) => return Ok(RunReport::failure(format!("Invalid PORTS: {}", reason))),
        };
        let timeout_ms = options.integer("TIMEOUT_MS").unwrap_or(500).max(1) as u64;
        let timeout = Duration::from_millis(timeout_ms);
        let threads = options.integer("THREADS").unwrap_or(DEFAULT_THREADS);
        if !(1..=1024).contains(&threads) {
            return Ok(RunReport::failure(format!(
                "Invalid THREADS: {} (expected 1-1024)",
                threads
            )));
        }

        let ip = (host.as_str(), 0)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ModuleError::OperationError(format!("Cannot resolve {}", host)))?
            .ip();

        info!(
            "Scanning {} port(s) on {} ({}) with {} thread(s)",
            ports.len(),
            host,
            ip,
            threads
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .build()
            .map_err(|e| ModuleError::OperationError(format!("Thread pool: {}", e)))?;
        let open: Vec<u16> = pool.install(|| {
            ports
                .par_iter()
                .copied()
                .filter(|&port| is_open(SocketAddr::new(ip, port), timeout))
                .collect()
        });
        debug!("Open ports on {}: {:?}", host, open);

        Ok(RunReport::success(json!({
            "host": host,
            "address": ip.to_string(),
            "scanned": ports.len(),
            "open_ports": open,
        })))
    }
}
