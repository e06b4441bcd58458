//! Connection transport to an ensemble member.
//!
//! # Overview
//!
//! A transport owns one socket at a time. The session owner drives it:
//!
//! ```text
//! host_provider.next() ──► connect(endpoint) ──► loop { do_transport(wait) }
//!          ▲                                              │
//!          └──────────── error: cleanup + on_disconnected ◄┘
//! ```
//!
//! Each [`ConnectionTransport::do_transport`] pass waits for the first of:
//! socket readable, socket writable with packets queued, the wake-up
//! signal, or `wait` elapsing. It then performs at most one read or one
//! write and returns. Passes never overlap because they take `&mut self`.
//!
//! Other threads interact through a [`TransportHandle`]: they push packets
//! onto the shared [`PacketQueues`](crate::PacketQueues) and call
//! [`TransportHandle::enable_write`].

mod config;
mod error;
mod frame;
mod metrics;
mod owner;
mod socket;

pub use config::TransportConfig;
pub use error::{FramingError, TransportError, TransportResult};
pub use frame::FrameReader;
pub use metrics::TransportMetrics;
pub use owner::{Reply, SessionOwner};
pub use socket::SocketTransport;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keeper_core::{AwaitableSignal, ResolvedEndPoint, VolatileCell};

/// The contract between a session owner and its socket engine.
#[async_trait(?Send)]
pub trait ConnectionTransport {
    /// Open a connection to `endpoint`, closing any current one first.
    ///
    /// The handshake is queued on the next [`Self::do_transport`] pass.
    async fn connect(&mut self, endpoint: &ResolvedEndPoint) -> TransportResult<()>;

    /// Whether a socket is open.
    fn is_connected(&self) -> bool;

    /// Run one readiness pass, waiting at most `wait`.
    ///
    /// # Errors
    ///
    /// Any error other than [`TransportError::NotConnected`] has already
    /// torn the connection down and notified the owner.
    async fn do_transport(&mut self, wait: Duration) -> TransportResult<()>;

    /// Enable both read and write interest.
    fn enable_read_write_only(&self);

    /// A thread-safe handle for waking this transport.
    fn handle(&self) -> TransportHandle;

    /// Tear down the current connection. Idempotent.
    async fn cleanup(&mut self);

    /// Tear down the connection and fail every queued packet as closing.
    async fn close(&mut self);

    /// Tag subsequent log output with a session id.
    fn introduce(&mut self, session_id: i64);

    /// Refresh the cached monotonic time.
    fn update_now(&mut self);

    /// Treat the cached time as both last send and last receive.
    fn update_last_send_and_heard(&mut self);

    /// Time since the last write.
    fn idle_send(&self) -> Duration;

    /// Time since the last read.
    fn idle_recv(&self) -> Duration;

    /// Packets fully written.
    fn sent_count(&self) -> u64;

    /// Frames fully read.
    fn recv_count(&self) -> u64;

    /// Address of the connected server.
    fn remote_socket_address(&self) -> Option<SocketAddr>;

    /// Local address of the socket.
    fn local_socket_address(&self) -> Option<SocketAddr>;

    /// Counters across all connections.
    fn metrics(&self) -> &TransportMetrics;
}

/// State shared between a transport and its handles.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) read_enabled: AtomicBool,
    pub(crate) write_enabled: AtomicBool,
    pub(crate) signal: AwaitableSignal,
    pub(crate) remote: VolatileCell<Option<SocketAddr>>,
    pub(crate) session_id: AtomicI64,
}

impl Shared {
    pub(crate) fn set_interest(&self, read: bool, write: bool) {
        self.read_enabled.store(read, Ordering::Release);
        self.write_enabled.store(write, Ordering::Release);
    }
}

/// Cloneable, thread-safe view of a transport.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    shared: Arc<Shared>,
}

impl TransportHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Interrupt a pending readiness wait.
    pub fn wakeup(&self) {
        self.shared.signal.try_signal();
    }

    /// Request write interest after enqueueing, and wake the transport.
    pub fn enable_write(&self) {
        self.shared.write_enabled.store(true, Ordering::Release);
        self.wakeup();
    }

    /// Session id assigned by the server, or zero.
    pub fn session_id(&self) -> i64 {
        self.shared.session_id.load(Ordering::Acquire)
    }

    /// Address of the connected server.
    pub fn remote_socket_address(&self) -> Option<SocketAddr> {
        self.shared.remote.get()
    }
}
