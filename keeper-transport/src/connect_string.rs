//! Connect string parsing.
//!
//! Format: `host1:port1,host2:port2[/chroot]`
//!
//! - Hosts are comma separated; empty tokens are skipped.
//! - A host without a port, or ending in `:`, gets [`DEFAULT_PORT`].
//! - Everything from the first `/` on is the chroot. A chroot of exactly
//!   `/` means no chroot.
//! - Duplicate `(host, port)` pairs are dropped, keeping the first one.
//!
//! Parsing is pure: no I/O and no resolution.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use keeper_core::HostAndPort;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::{validate_path, MalformedPathError};

/// Port used when a host token does not name one.
pub const DEFAULT_PORT: u16 = 2181;

/// Errors produced while parsing a connect string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectStringError {
    /// The chroot suffix is not a valid node path.
    #[error(transparent)]
    MalformedPath(#[from] MalformedPathError),

    /// A host token carries a port that is not a valid u16.
    #[error("invalid port in host {token:?}")]
    InvalidPort {
        /// The offending host token.
        token: String,
    },
}

/// The parsed form of a connect string.
///
/// # Examples
///
/// ```
/// use keeper_transport::ConnectString;
///
/// let parsed: ConnectString = "zk1:2181,zk2/app".parse().expect("valid");
/// assert_eq!(parsed.chroot(), Some("/app"));
/// assert_eq!(parsed.hosts().len(), 2);
/// assert_eq!(parsed.hosts()[1].port, 2181);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectString {
    chroot: Option<String>,
    hosts: Vec<HostAndPort>,
}

impl ConnectString {
    /// Parse a connect string.
    pub fn parse(input: &str) -> Result<Self, ConnectStringError> {
        let (host_list, chroot) = match input.find('/') {
            Some(off) => {
                let path = &input[off..];
                let chroot = if path.len() == 1 {
                    None
                } else {
                    validate_path(path)?;
                    Some(path.to_string())
                };
                (&input[..off], chroot)
            }
            None => (input, None),
        };

        let mut seen = HashSet::new();
        let mut hosts = Vec::new();
        for token in host_list.split(',').filter(|t| !t.is_empty()) {
            let host = parse_host(token)?;
            if seen.insert(host.clone()) {
                hosts.push(host);
            }
        }

        Ok(Self { chroot, hosts })
    }

    /// The chroot path, if any.
    pub fn chroot(&self) -> Option<&str> {
        self.chroot.as_deref()
    }

    /// Deduplicated hosts in first-occurrence order.
    ///
    /// The order is for display only; the host provider shuffles.
    pub fn hosts(&self) -> &[HostAndPort] {
        &self.hosts
    }

    /// Consume the connect string, returning its hosts.
    pub fn into_hosts(self) -> Vec<HostAndPort> {
        self.hosts
    }

    /// Map a client-visible path to the server path.
    pub fn prepend_chroot(&self, client_path: &str) -> String {
        match &self.chroot {
            Some(chroot) if client_path == "/" => chroot.clone(),
            Some(chroot) => format!("{chroot}{client_path}"),
            None => client_path.to_string(),
        }
    }

    /// Map a server path back to the client-visible path.
    ///
    /// Paths outside the chroot are returned unchanged.
    pub fn strip_chroot<'a>(&self, server_path: &'a str) -> &'a str {
        let Some(chroot) = &self.chroot else {
            return server_path;
        };
        match server_path.strip_prefix(chroot.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => server_path,
        }
    }
}

fn parse_host(token: &str) -> Result<HostAndPort, ConnectStringError> {
    // Colons inside an IPv6 bracket are part of the address.
    let separator = match token.rfind(']') {
        Some(close) => token[close..].rfind(':').map(|i| close + i),
        None => token.rfind(':'),
    };
    let Some(idx) = separator else {
        return Ok(HostAndPort::new(token, DEFAULT_PORT));
    };
    let port_str = &token[idx + 1..];
    let port = if port_str.is_empty() {
        DEFAULT_PORT
    } else {
        port_str
            .parse()
            .map_err(|_| ConnectStringError::InvalidPort {
                token: token.to_string(),
            })?
    };
    Ok(HostAndPort::new(&token[..idx], port))
}

impl FromStr for ConnectString {
    type Err = ConnectStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, host) in self.hosts.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{host}")?;
        }
        if let Some(chroot) = &self.chroot {
            f.write_str(chroot)?;
        }
        Ok(())
    }
}
