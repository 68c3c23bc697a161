//! Environment-derived configuration.
//!
//! Host and port come from the environment, per the wire contract in
//! spec §6 — there is no file-based configuration layer here, by design;
//! a fuller configuration system is an external collaborator this crate
//! does not implement.

use std::net::{SocketAddr, ToSocketAddrs};

/// Environment variable carrying the server's address.
pub const SERVER_ADDR_VAR: &str = "server15440";
/// Environment variable carrying the server's TCP port.
pub const SERVER_PORT_VAR: &str = "serverport15440";

const DEFAULT_ADDR: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 20080;

/// Resolved `(host, port)` the client should dial or the server should bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Reads `server15440`/`serverport15440` from the environment, falling
    /// back to `127.0.0.1`/`20080` when unset.
    pub fn from_env() -> Self {
        let host = std::env::var(SERVER_ADDR_VAR).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        let port = std::env::var(SERVER_PORT_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Endpoint { host, port }
    }

    /// Resolves this endpoint to a socket address suitable for `TcpStream::connect`
    /// or `TcpListener::bind`.
    pub fn to_socket_addr(&self) -> std::io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("could not resolve {}:{}", self.host, self.port),
                )
            })
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            host: DEFAULT_ADDR.to_string(),
            port: DEFAULT_PORT,
        }
    }
}
