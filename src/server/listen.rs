//! Binding the listening socket.

use std::io;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Bind `host:port`, moving on to the next port while the address is in use.
///
/// At most `attempts` consecutive ports are tried. Errors other than
/// `AddrInUse` are returned immediately.
pub async fn bind_with_retry(host: &str, port: u16, attempts: u16) -> io::Result<TcpListener> {
    let attempts = attempts.max(1);
    for offset in 0..attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    info!(requested = port, bound = candidate, "Bound to fallback port");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                warn!(port = candidate, "Port in use, trying the next one");
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!(
            "no free port in {}..={} on {}",
            port,
            port.saturating_add(attempts - 1),
            host
        ),
    ))
}
