//! Failover-ordered, self-refreshing supply of ensemble endpoints.
//!
//! # Lifecycle
//!
//! ```text
//! ┌────────────┐  first next()   ┌───────────┐  at least one   ┌────────┐
//! │ Unresolved ├────────────────►│ Resolving ├────────────────►│ Steady │
//! └────────────┘                 └─────┬─────┘                 └───┬────┘
//!        ▲                             │ attempts exhausted        │
//!        │                             ▼                           │
//!        │                     HostUnreachable                     │
//!        └─────────────── too many empty refreshes ────────────────┘
//! ```
//!
//! In the steady state `next()` walks a shuffled endpoint list circularly.
//! Coming back around to the last endpoint that connected starts a
//! background re-resolution and sleeps the caller's spin delay, which
//! throttles reconnect storms against a single server. A finished refresh
//! replaces the list (re-shuffled) when it is non-empty, moving the last
//! connected endpoint to the tail so it is revisited last.

use std::rc::Rc;
use std::time::Duration;

use keeper_core::{
    HostAndPort, Providers, RandomProvider, ResolvedEndPoint, TaskProvider, TimeProvider,
};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::resolver::{comma_delimited, DnsResolver, Resolve, DNS_TIMEOUT};

/// Errors surfaced by the host provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostProviderError {
    /// Constructed without any host.
    #[error("a host provider may not be empty")]
    Empty,

    /// No endpoint could be resolved within the bounded retry policy.
    #[error("unable to resolve any endpoint from hosts {{{hosts}}} after {attempts} attempts")]
    HostUnreachable {
        /// The hosts that were tried.
        hosts: String,
        /// How many resolution rounds were made.
        attempts: u32,
    },
}

/// Result type for host provider operations.
pub type HostProviderResult<T> = Result<T, HostProviderError>;

/// Configuration for resolution and refresh behavior.
#[derive(Clone, Debug)]
pub struct HostProviderConfig {
    /// Bound on a single host lookup.
    pub dns_timeout: Duration,

    /// Resolution rounds made by a foreground resolution before giving up
    /// with [`HostProviderError::HostUnreachable`]. Rounds after the very
    /// first one are preceded by the caller's spin delay.
    pub max_resolution_attempts: u32,

    /// Consecutive empty background refreshes tolerated before the endpoint
    /// list is considered stale and discarded. Zero keeps stale endpoints
    /// forever.
    pub max_failed_refreshes: u32,
}

impl Default for HostProviderConfig {
    fn default() -> Self {
        Self {
            dns_timeout: DNS_TIMEOUT,
            max_resolution_attempts: 3,
            max_failed_refreshes: 5,
        }
    }
}

impl HostProviderConfig {
    /// Set the per-host lookup timeout.
    pub fn with_dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    /// Set the number of foreground resolution rounds.
    pub fn with_max_resolution_attempts(mut self, attempts: u32) -> Self {
        self.max_resolution_attempts = attempts;
        self
    }

    /// Set the staleness ceiling for background refreshes.
    pub fn with_max_failed_refreshes(mut self, refreshes: u32) -> Self {
        self.max_failed_refreshes = refreshes;
        self
    }
}

/// Host provider that resolves lazily and re-resolves after every lap.
///
/// Driven by a single caller; background refreshes are spawned through the
/// task provider and therefore need a [`tokio::task::LocalSet`].
pub struct DynamicHostProvider<P: Providers, R: Resolve + 'static = DnsResolver<P>> {
    providers: P,
    resolver: Rc<R>,
    config: HostProviderConfig,
    unresolved: Vec<HostAndPort>,
    resolved: Option<Vec<ResolvedEndPoint>>,
    current_index: usize,
    last_endpoint: Option<ResolvedEndPoint>,
    background: Option<JoinHandle<Vec<ResolvedEndPoint>>>,
    first_dns_try: bool,
    failed_refreshes: u32,
}

impl<P: Providers> DynamicHostProvider<P> {
    /// Create a provider that resolves through the providers' lookup.
    pub fn new(
        providers: P,
        hosts: Vec<HostAndPort>,
        config: HostProviderConfig,
    ) -> HostProviderResult<Self> {
        let resolver = DnsResolver::new(providers.clone()).with_timeout(config.dns_timeout);
        Self::with_resolver(providers, hosts, resolver, config)
    }
}

impl<P: Providers, R: Resolve + 'static> DynamicHostProvider<P, R> {
    /// Create a provider with an explicit resolver.
    ///
    /// # Errors
    ///
    /// Returns [`HostProviderError::Empty`] if `hosts` is empty.
    pub fn with_resolver(
        providers: P,
        hosts: Vec<HostAndPort>,
        resolver: R,
        config: HostProviderConfig,
    ) -> HostProviderResult<Self> {
        if hosts.is_empty() {
            return Err(HostProviderError::Empty);
        }
        Ok(Self {
            providers,
            resolver: Rc::new(resolver),
            config,
            unresolved: hosts,
            resolved: None,
            current_index: 0,
            last_endpoint: None,
            background: None,
            first_dns_try: true,
            failed_refreshes: 0,
        })
    }

    /// Number of resolved endpoints; zero until the first resolution.
    pub fn size(&self) -> usize {
        self.resolved.as_ref().map_or(0, Vec::len)
    }

    /// Cursor into the current endpoint list.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The endpoint revisits are throttled against.
    pub fn last_endpoint(&self) -> Option<&ResolvedEndPoint> {
        self.last_endpoint.as_ref()
    }

    /// Whether a background refresh is still running.
    pub fn is_resolving_in_background(&self) -> bool {
        self.background.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Hand out the next endpoint to dial.
    ///
    /// May sleep `spin_delay` when it is about to offer the last connected
    /// endpoint again.
    ///
    /// # Errors
    ///
    /// Returns [`HostProviderError::HostUnreachable`] when a foreground
    /// resolution exhausts its attempts.
    pub async fn next(&mut self, spin_delay: Duration) -> HostProviderResult<ResolvedEndPoint> {
        if let Some(endpoints) = &self.resolved {
            self.current_index = (self.current_index + 1) % endpoints.len();
            self.absorb_refresh().await;
        }

        let (next, first) = match &self.resolved {
            Some(endpoints) => (endpoints[self.current_index].clone(), endpoints[0].clone()),
            None => {
                let endpoints = self.resolve_at_least_one(spin_delay).await?;
                let first = endpoints[0].clone();
                self.current_index = 0;
                self.resolved = Some(endpoints);
                return Ok(first);
            }
        };

        if self.last_endpoint.as_ref() == Some(&next) && spin_delay > Duration::ZERO {
            if self.background.is_none() {
                self.start_refresh();
            }
            self.spin(spin_delay).await;
        } else if self.last_endpoint.is_none() {
            self.last_endpoint = Some(first);
        }
        Ok(next)
    }

    /// Record the endpoint handed out last as proven good.
    pub fn on_connected(&mut self) {
        if let Some(endpoints) = &self.resolved {
            self.last_endpoint = endpoints.get(self.current_index).cloned();
        }
    }

    async fn spin(&self, delay: Duration) {
        if let Err(e) = self.providers.time().sleep(delay).await {
            tracing::debug!("Ignoring failed spin delay of {:?}: {}", delay, e);
        }
    }

    async fn absorb_refresh(&mut self) {
        if !self.background.as_ref().is_some_and(|h| h.is_finished()) {
            return;
        }
        let Some(handle) = self.background.take() else {
            return;
        };
        let mut refreshed = match handle.await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                tracing::warn!("Background resolution task failed: {}", e);
                Vec::new()
            }
        };

        if refreshed.is_empty() {
            self.failed_refreshes += 1;
            if self.config.max_failed_refreshes > 0
                && self.failed_refreshes >= self.config.max_failed_refreshes
            {
                tracing::warn!(
                    "Discarding {} stale endpoints after {} failed background resolutions",
                    self.size(),
                    self.failed_refreshes
                );
                self.resolved = None;
                self.last_endpoint = None;
                self.failed_refreshes = 0;
            } else {
                tracing::debug!(
                    "Keeping the current resolved endpoints since background resolution failed"
                );
            }
            return;
        }

        self.failed_refreshes = 0;
        let last_position = self
            .last_endpoint
            .as_ref()
            .and_then(|last| refreshed.iter().position(|ep| ep == last));
        match last_position {
            Some(pos) => {
                let last = refreshed.remove(pos);
                refreshed.push(last);
            }
            None => self.last_endpoint = None,
        }
        tracing::debug!("Refreshed endpoints to {{{}}}", comma_delimited(&refreshed));
        self.current_index = 0;
        self.resolved = Some(refreshed);
    }

    fn start_refresh(&mut self) {
        let resolver = self.resolver.clone();
        let hosts = self.unresolved.clone();
        let random = self.providers.random().clone();
        self.background = Some(self.providers.task().spawn_task(
            "host_provider_refresh",
            async move { resolve_and_shuffle(&*resolver, &hosts, &random).await },
        ));
    }

    async fn resolve_at_least_one(
        &mut self,
        spin_delay: Duration,
    ) -> HostProviderResult<Vec<ResolvedEndPoint>> {
        let attempts = self.config.max_resolution_attempts.max(1);
        let for_log = comma_delimited(&self.unresolved);
        for _ in 0..attempts {
            if self.first_dns_try {
                self.first_dns_try = false;
            } else {
                tracing::debug!(
                    "No endpoint resolved yet, sleeping {:?} before retrying",
                    spin_delay
                );
                self.spin(spin_delay).await;
            }
            tracing::debug!("Trying to resolve at least one endpoint from hosts {{{}}}", for_log);
            let endpoints =
                resolve_and_shuffle(&*self.resolver, &self.unresolved, self.providers.random())
                    .await;
            if !endpoints.is_empty() {
                return Ok(endpoints);
            }
            tracing::debug!("Failed to resolve any endpoint from hosts {{{}}}", for_log);
        }
        Err(HostProviderError::HostUnreachable {
            hosts: for_log,
            attempts,
        })
    }
}

impl<P: Providers, R: Resolve + 'static> Drop for DynamicHostProvider<P, R> {
    fn drop(&mut self) {
        if let Some(handle) = self.background.take() {
            handle.abort();
        }
    }
}

async fn resolve_and_shuffle<R: Resolve + ?Sized, X: RandomProvider>(
    resolver: &R,
    hosts: &[HostAndPort],
    random: &X,
) -> Vec<ResolvedEndPoint> {
    let mut endpoints = resolver.resolve(hosts).await;
    random.shuffle(&mut endpoints);
    endpoints
}
