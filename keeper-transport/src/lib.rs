//! # keeper-transport
//!
//! Connection layer of a coordination-service client.
//!
//! This crate provides:
//! - **Connect strings**: parsing `host:port,host:port/chroot` into hosts and
//!   a validated chroot
//! - **Resolution**: concurrent, timeout-bounded host lookup
//! - **Host provider**: shuffled failover order with background refresh
//! - **Wire format**: length-prefixed frames and the session handshake
//! - **Transport**: a non-blocking socket engine correlating replies with
//!   requests in send order
//!
//! ## Reconnect loop
//!
//! ```ignore
//! let mut hosts = DynamicHostProvider::new(providers, connect_string.into_hosts(), config)?;
//! loop {
//!     let endpoint = hosts.next(spin_delay).await?;
//!     if transport.connect(&endpoint).await.is_err() {
//!         continue;
//!     }
//!     while transport.do_transport(wait).await.is_ok() {}
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// Re-export core types for convenience
pub use keeper_core::{
    AwaitableSignal, HostAndPort, LookupProvider, NetworkProvider, Providers, RandomProvider,
    ResolvedEndPoint, TaskProvider, TimeProvider, TokioProviders, VolatileCell,
};

// =============================================================================
// Modules
// =============================================================================

/// Connect string parsing.
pub mod connect_string;

/// Node path validation.
pub mod path;

/// Ensemble host resolution.
pub mod resolver;

/// Failover-ordered endpoint supply.
pub mod host_provider;

/// Frame and record encoding.
pub mod wire;

/// Packets and their queues.
pub mod packet;

/// The socket engine.
pub mod transport;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use connect_string::{ConnectString, ConnectStringError, DEFAULT_PORT};
pub use path::{validate_path, MalformedPathError, PathViolation};
pub use resolver::{DnsResolver, Resolve, DNS_TIMEOUT};
pub use host_provider::{
    DynamicHostProvider, HostProviderConfig, HostProviderError, HostProviderResult,
};
pub use wire::{
    ConnectRequest, ConnectResponse, OpCode, ReplyHeader, RequestHeader, WireError,
    DEFAULT_MAX_PACKET_LEN, LENGTH_PREFIX_SIZE,
};
pub use packet::{Packet, PacketError, PacketQueues, Response, ResponseFuture};
pub use transport::{
    ConnectionTransport, FrameReader, FramingError, Reply, SessionOwner, SocketTransport,
    TransportConfig, TransportError, TransportHandle, TransportMetrics, TransportResult,
};
