//! Bind-address resolution and port selection for local runs.
//!
//! The chosen port is bound once and released before the function process binds
//! it, so another process may claim it in between. This race is accepted;
//! the child reports the bind failure through its job's error channel.

use std::net::TcpListener;

use crate::error::{io_err, RunError};
use crate::paths::{DEFAULT_RUN_HOST, DEFAULT_RUN_PORT};

/// Split an optional `host:port` into its parts, defaulting to
/// `127.0.0.1:8080`. An empty host keeps the default host.
pub fn resolve_address(address: Option<&str>) -> Result<(String, u16), RunError> {
    let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok((DEFAULT_RUN_HOST.to_string(), DEFAULT_RUN_PORT));
    };
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| RunError::InvalidAddress(address.to_string()))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| RunError::InvalidAddress(address.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() { DEFAULT_RUN_HOST } else { host };
    Ok((host.to_string(), port))
}

/// Return `preferred` if it can be bound on `host`, otherwise an
/// OS-assigned free port. A preferred port of 0 means no preference.
pub fn choose_port(host: &str, preferred: u16) -> Result<u16, RunError> {
    if preferred != 0 {
        match TcpListener::bind((host, preferred)) {
            Ok(listener) => {
                drop(listener);
                return Ok(preferred);
            }
            Err(err) => {
                tracing::debug!(host, port = preferred, error = %err, "preferred port unavailable");
            }
        }
    }
    let listener = TcpListener::bind((host, 0)).map_err(|e| io_err(format!("{host}:0"), e))?;
    let port = listener
        .local_addr()
        .map_err(|e| io_err(format!("{host}:0"), e))?
        .port();
    drop(listener);
    Ok(port)
}

/// `host:port`, with IPv6 hosts in brackets.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Whether nothing is currently listening on `port` of the loopback host.
pub(crate) fn port_is_free(port: u16) -> bool {
    TcpListener::bind((DEFAULT_RUN_HOST, port)).is_ok()
}
