//! # keeper-core
//!
//! Core abstractions for the keeper session transport.
//!
//! - **Provider traits**: time, tasks, randomness, networking and name lookup,
//!   so the transport and host provider run unchanged against Tokio or
//!   against in-memory fakes in tests
//! - **Core types**: [`HostAndPort`] and [`ResolvedEndPoint`]
//! - **Sync primitives**: [`VolatileCell`] and [`AwaitableSignal`]
//!
//! ## Provider Traits
//!
//! - [`TimeProvider`]: Sleep, timeout, and monotonic time
//! - [`TaskProvider`]: Task spawning for single-threaded environments
//! - [`RandomProvider`]: Endpoint shuffling
//! - [`NetworkProvider`]: Client connections
//! - [`LookupProvider`]: Host name resolution

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod lookup;
mod network;
mod providers;
mod random;
mod sync;
mod task;
mod time;
mod types;

pub use lookup::{LookupProvider, TokioLookupProvider};
pub use network::{NetworkProvider, TokioNetworkProvider};
pub use providers::{ProviderBundle, Providers, TokioProviders};
pub use random::{RandomProvider, SeededRandomProvider, TokioRandomProvider};
pub use sync::{AwaitableSignal, VolatileCell};
pub use task::{TaskProvider, TokioTaskProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};
pub use types::{HostAndPort, ResolvedEndPoint};
