//! Minimal raw HTTP/1.1 client
//!
//! Traversal payloads must reach the server byte for byte, so requests are
//! written straight to a TCP socket instead of going through a URL parser
//! that would normalize `..` segments and percent escapes.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

use crate::module::ModuleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Send `GET <path>` exactly as given and read the whole response
pub fn get(
    host: &str,
    port: u16,
    path: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<RawResponse, ModuleError> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ModuleError::OperationError(format!("Cannot resolve {}", host)))?;

    let mut stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let request = format!(
        concat!(
            "GET {} HTTP/1.1\r\nHost: {}:{}\r\nUser-Agent: {}\r\n",
            "Accept: */*\r\nConnection: close\r\n\r\n",
        ),
        path, host, port, user_agent
    );
    debug!("GET {} from {}:{}", path, host, port);
    stream.write_all(request.as_bytes())?;

    let mut raw = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            // Servers that ignore `Connection: close` stall here; keep what arrived
            Err(e)
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
                    && !raw.is_empty() =>
            {
                break
            }
            Err(e) => return Err(e.into()),
        }
    }

    parse_response(&raw)
}

/// Parse a complete HTTP/1.x response, decoding chunked bodies
pub fn parse_response(raw: &[u8]) -> Result<RawResponse, ModuleError> {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| ModuleError::OperationError("Malformed HTTP response".to_string()))?;
    let head = String::from_utf8_lossy(&raw[..split]);
    let body = &raw[split + 4..];

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            ModuleError::OperationError(format!("Malformed status line: {}", status_line))
        })?;

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let chunked = headers.iter().any(|(key, value)| {
        key.eq_ignore_ascii_case("transfer-encoding") && value.eq_ignore_ascii_case("chunked")
    });
    let body = if chunked {
        decode_chunked(body)
    } else {
        body.to_vec()
    };

    Ok(RawResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn decode_chunked(mut data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    while let Some(line_end) = data.windows(2).position(|w| w == b"\r\n") {
        let size_text = String::from_utf8_lossy(&data[..line_end]);
        let size_text = size_text.split(';').next().unwrap_or_default().trim();
        let Ok(size) = usize::from_str_radix(size_text, 16) else {
            break;
        };
        data = &data[line_end + 2..];
        if size == 0 || data.len() < size {
            body.extend_from_slice(&data[..size.min(data.len())]);
            break;
        }
        body.extend_from_slice(&data[..size]);
        data = data.get(size + 2..).unwrap_or_default();
    }
    body
}
