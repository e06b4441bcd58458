//! Ensemble host resolution.
//!
//! Numeric hosts resolve immediately. Symbolic hosts are looked up
//! concurrently, each raced against its own timeout, so resolving N hosts
//! takes at most one timeout rather than N. A host that fails or times out
//! contributes no endpoints; the failure is logged and never propagated.

use std::collections::HashSet;
use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use keeper_core::{HostAndPort, LookupProvider, Providers, ResolvedEndPoint, TimeProvider};

/// Default bound on a single host lookup.
pub const DNS_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns unresolved hosts into dialable endpoints.
#[async_trait(?Send)]
pub trait Resolve {
    /// Resolve every host, returning the deduplicated union of endpoints.
    ///
    /// Never fails; hosts that cannot be resolved are simply absent.
    async fn resolve(&self, hosts: &[HostAndPort]) -> Vec<ResolvedEndPoint>;
}

/// [`Resolve`] implementation backed by the providers' lookup and clock.
#[derive(Clone)]
pub struct DnsResolver<P: Providers> {
    providers: P,
    timeout: Duration,
}

impl<P: Providers> DnsResolver<P> {
    /// Create a resolver with the default timeout.
    pub fn new(providers: P) -> Self {
        Self {
            providers,
            timeout: DNS_TIMEOUT,
        }
    }

    /// Override the per-host lookup timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn resolve_host(&self, host: &HostAndPort) -> Vec<ResolvedEndPoint> {
        tracing::debug!("Resolving host {}", host.host);
        let lookup = self.providers.lookup().lookup_host(&host.host);
        match self.providers.time().timeout(self.timeout, lookup).await {
            Err(elapsed) => {
                tracing::warn!("Resolving host {} failed: {}", host.host, elapsed);
                Vec::new()
            }
            Ok(Err(e)) => {
                tracing::error!("Failed resolving host {}: {}", host.host, e);
                Vec::new()
            }
            Ok(Ok(ips)) => {
                tracing::debug!("Resolved host {} to {{{}}}", host.host, comma_delimited(&ips));
                ips.into_iter()
                    .map(|ip| ResolvedEndPoint::new(ip, host.clone()))
                    .collect()
            }
        }
    }
}

#[async_trait(?Send)]
impl<P: Providers> Resolve for DnsResolver<P> {
    async fn resolve(&self, hosts: &[HostAndPort]) -> Vec<ResolvedEndPoint> {
        let for_log = comma_delimited(hosts);
        tracing::debug!("Resolving hosts {{{}}}", for_log);

        let mut resolved = Vec::new();
        let mut lookups = Vec::new();
        for host in hosts {
            match host.ip_literal() {
                Some(ip) => resolved.push(ResolvedEndPoint::new(ip, host.clone())),
                None => lookups.push(self.resolve_host(host)),
            }
        }
        for endpoints in join_all(lookups).await {
            resolved.extend(endpoints);
        }

        let mut seen = HashSet::new();
        resolved.retain(|ep| seen.insert(ep.addr()));
        tracing::debug!(
            "Resolved hosts {{{}}} to {{{}}}",
            for_log,
            comma_delimited(&resolved)
        );
        resolved
    }
}

pub(crate) fn comma_delimited<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
