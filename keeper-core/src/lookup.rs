//! Host name lookup abstraction.

use async_trait::async_trait;
use std::io;
use std::net::IpAddr;

/// Provider trait for resolving a symbolic host name to addresses.
///
/// Implementations must not apply their own timeout; callers race the
/// returned future against [`crate::TimeProvider::timeout`] and drop it when
/// it loses.
#[async_trait(?Send)]
pub trait LookupProvider: Clone {
    /// Resolve `host` to zero or more IP addresses.
    async fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// System resolver backed by [`tokio::net::lookup_host`].
#[derive(Debug, Clone, Default)]
pub struct TokioLookupProvider;

impl TokioLookupProvider {
    /// Create a new system lookup provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl LookupProvider for TokioLookupProvider {
    async fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_numeric_host() {
        let ips = TokioLookupProvider::new()
            .lookup_host("127.0.0.1")
            .await
            .expect("lookup");
        assert_eq!(ips, vec![IpAddr::from([127, 0, 0, 1])]);
    }
}
