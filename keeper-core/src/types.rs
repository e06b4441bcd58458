//! Core types for ensemble addressing.
//!
//! - [`HostAndPort`]: an unresolved ensemble member as written in a connect string
//! - [`ResolvedEndPoint`]: a numeric socket address bound to the host it came from

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// An unresolved host name or literal plus a port.
///
/// Equality is by `(host, port)`; the host is compared verbatim, so
/// `localhost:2181` and `127.0.0.1:2181` are distinct until resolved.
///
/// # Examples
///
/// ```
/// use keeper_core::HostAndPort;
///
/// let host = HostAndPort::new("zk1.example.com", 2181);
/// assert_eq!(host.to_string(), "zk1.example.com:2181");
/// assert!(host.ip_literal().is_none());
///
/// let literal = HostAndPort::new("[::1]", 2181);
/// assert!(literal.ip_literal().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAndPort {
    /// Host name or numeric literal. IPv6 literals may carry brackets.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl HostAndPort {
    /// Create a new host and port pair.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host as a numeric address, if it is one.
    ///
    /// Accepts bracketed IPv6 literals (`[::1]`).
    pub fn ip_literal(&self) -> Option<IpAddr> {
        let host = self
            .host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host);
        host.parse().ok()
    }
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A numeric endpoint together with the host it was resolved from.
///
/// Equality and hashing only consider the socket address, so a refreshed
/// resolution can recognise "the same endpoint as before" even when it was
/// reached through a different name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEndPoint {
    addr: SocketAddr,
    origin: HostAndPort,
}

impl ResolvedEndPoint {
    /// Bind a resolved IP to the host it was resolved from.
    pub fn new(ip: IpAddr, origin: HostAndPort) -> Self {
        Self {
            addr: SocketAddr::new(ip, origin.port),
            origin,
        }
    }

    /// The socket address to dial.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The unresolved host this endpoint came from.
    pub fn origin(&self) -> &HostAndPort {
        &self.origin
    }
}

impl PartialEq for ResolvedEndPoint {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for ResolvedEndPoint {}

impl Hash for ResolvedEndPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl fmt::Display for ResolvedEndPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.addr, self.origin.host)
    }
}
