//! Provider bundle trait for simplified type parameters.
//!
//! Without bundling, the resolver, host provider and transport would each
//! carry five separate type parameters. With bundling this collapses to
//! `struct MyStruct<P: Providers>`.
//!
//! ## Usage
//!
//! ```rust
//! use keeper_core::{Providers, TimeProvider, TokioProviders};
//!
//! let providers = TokioProviders::new();
//! let _now = providers.time().now();
//! ```

use crate::{
    LookupProvider, NetworkProvider, RandomProvider, TaskProvider, TimeProvider,
    TokioLookupProvider, TokioNetworkProvider, TokioRandomProvider, TokioTaskProvider,
    TokioTimeProvider,
};

/// Bundle of all provider types for a runtime environment.
pub trait Providers: Clone + 'static {
    /// Network provider type for client connections.
    type Network: NetworkProvider + Clone + 'static;

    /// Time provider type for sleep, timeout, and time queries.
    type Time: TimeProvider + Clone + 'static;

    /// Task provider type for spawning local tasks.
    type Task: TaskProvider + Clone + 'static;

    /// Random provider type for endpoint shuffling.
    type Random: RandomProvider + Clone + 'static;

    /// Lookup provider type for host name resolution.
    type Lookup: LookupProvider + Clone + 'static;

    /// Get the network provider instance.
    fn network(&self) -> &Self::Network;

    /// Get the time provider instance.
    fn time(&self) -> &Self::Time;

    /// Get the task provider instance.
    fn task(&self) -> &Self::Task;

    /// Get the random provider instance.
    fn random(&self) -> &Self::Random;

    /// Get the lookup provider instance.
    fn lookup(&self) -> &Self::Lookup;
}

/// A concrete bundle of five providers.
///
/// Start from [`TokioProviders::new`] and replace individual providers with
/// the `with_*` methods, for example to inject an in-memory network in tests.
#[derive(Clone, Debug)]
pub struct ProviderBundle<N, T, K, R, L> {
    network: N,
    time: T,
    task: K,
    random: R,
    lookup: L,
}

/// Production providers using the Tokio runtime and the system resolver.
pub type TokioProviders = ProviderBundle<
    TokioNetworkProvider,
    TokioTimeProvider,
    TokioTaskProvider,
    TokioRandomProvider,
    TokioLookupProvider,
>;

impl TokioProviders {
    /// Create a new production providers bundle.
    pub fn new() -> Self {
        Self {
            network: TokioNetworkProvider::new(),
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
            random: TokioRandomProvider::new(),
            lookup: TokioLookupProvider::new(),
        }
    }
}

impl Default for TokioProviders {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, T, K, R, L> ProviderBundle<N, T, K, R, L> {
    /// Replace the network provider.
    pub fn with_network<N2>(self, network: N2) -> ProviderBundle<N2, T, K, R, L> {
        ProviderBundle {
            network,
            time: self.time,
            task: self.task,
            random: self.random,
            lookup: self.lookup,
        }
    }

    /// Replace the time provider.
    pub fn with_time<T2>(self, time: T2) -> ProviderBundle<N, T2, K, R, L> {
        ProviderBundle {
            network: self.network,
            time,
            task: self.task,
            random: self.random,
            lookup: self.lookup,
        }
    }

    /// Replace the task provider.
    pub fn with_task<K2>(self, task: K2) -> ProviderBundle<N, T, K2, R, L> {
        ProviderBundle {
            network: self.network,
            time: self.time,
            task,
            random: self.random,
            lookup: self.lookup,
        }
    }

    /// Replace the random provider.
    pub fn with_random<R2>(self, random: R2) -> ProviderBundle<N, T, K, R2, L> {
        ProviderBundle {
            network: self.network,
            time: self.time,
            task: self.task,
            random,
            lookup: self.lookup,
        }
    }

    /// Replace the lookup provider.
    pub fn with_lookup<L2>(self, lookup: L2) -> ProviderBundle<N, T, K, R, L2> {
        ProviderBundle {
            network: self.network,
            time: self.time,
            task: self.task,
            random: self.random,
            lookup,
        }
    }
}

impl<N, T, K, R, L> Providers for ProviderBundle<N, T, K, R, L>
where
    N: NetworkProvider + Clone + 'static,
    T: TimeProvider + Clone + 'static,
    K: TaskProvider + Clone + 'static,
    R: RandomProvider + Clone + 'static,
    L: LookupProvider + Clone + 'static,
{
    type Network = N;
    type Time = T;
    type Task = K;
    type Random = R;
    type Lookup = L;

    fn network(&self) -> &Self::Network {
        &self.network
    }

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }

    fn random(&self) -> &Self::Random {
        &self.random
    }

    fn lookup(&self) -> &Self::Lookup {
        &self.lookup
    }
}
