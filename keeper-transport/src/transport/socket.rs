//! Socket-backed [`ConnectionTransport`].

use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use keeper_core::{NetworkProvider, Providers, ResolvedEndPoint, TimeProvider};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};

use super::config::TransportConfig;
use super::error::{TransportError, TransportResult};
use super::frame::FrameReader;
use super::metrics::TransportMetrics;
use super::owner::{Reply, SessionOwner};
use super::{ConnectionTransport, Shared, TransportHandle};
use crate::packet::{PacketError, PacketQueues};
use crate::wire::{xid, ConnectResponse, ReplyHeader};

type Stream<P> = <<P as Providers>::Network as NetworkProvider>::TcpStream;

enum Event {
    Read(io::Result<usize>),
    Wrote(io::Result<usize>),
    Wakeup,
    Idle,
}

/// Non-blocking transport over a provider stream.
///
/// Outgoing packets are written head first; a packet leaves the outgoing
/// queue only once its whole frame is flushed. Replies are matched strictly
/// against the head of the pending queue.
pub struct SocketTransport<P: Providers, O: SessionOwner> {
    providers: P,
    owner: Rc<O>,
    queues: Arc<PacketQueues>,
    config: TransportConfig,
    shared: Arc<Shared>,
    reader: Option<ReadHalf<Stream<P>>>,
    writer: Option<WriteHalf<Stream<P>>>,
    frames: FrameReader,
    local_addr: Option<SocketAddr>,
    just_connected: bool,
    handshake_sent: bool,
    initialized: bool,
    now: Duration,
    last_send: Duration,
    last_heard: Duration,
    metrics: TransportMetrics,
}

impl<P: Providers, O: SessionOwner> SocketTransport<P, O> {
    /// Create a disconnected transport.
    pub fn new(
        providers: P,
        owner: Rc<O>,
        queues: Arc<PacketQueues>,
        config: TransportConfig,
    ) -> Self {
        let frames = FrameReader::new(config.max_packet_len, config.initial_message_capacity);
        let now = providers.time().now();
        Self {
            providers,
            owner,
            queues,
            config,
            shared: Arc::new(Shared::default()),
            reader: None,
            writer: None,
            frames,
            local_addr: None,
            just_connected: false,
            handshake_sent: false,
            initialized: false,
            now,
            last_send: now,
            last_heard: now,
            metrics: TransportMetrics::new(),
        }
    }

    /// The queues this transport drains.
    pub fn queues(&self) -> &Arc<PacketQueues> {
        &self.queues
    }

    /// Whether the handshake response has been received on this connection.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn session_id(&self) -> i64 {
        self.shared.session_id.load(Ordering::Acquire)
    }

    async fn step(&mut self, wait: Duration) -> TransportResult<()> {
        self.shared.signal.reset();
        self.update_now();

        if self.just_connected {
            self.just_connected = false;
            self.update_last_send_and_heard();
            self.owner.prime_connection(&self.queues);
            self.enable_read_write_only();
        }
        if self.initialized && self.queues.has_outgoing() {
            self.shared.write_enabled.store(true, Ordering::Release);
        }

        // Until the handshake response arrives only the handshake is written.
        let can_write = self.shared.write_enabled.load(Ordering::Acquire)
            && (self.initialized || !self.handshake_sent);
        let head = if can_write {
            self.queues.outgoing_head_buffer()
        } else {
            None
        };
        let can_read = self.shared.read_enabled.load(Ordering::Acquire);

        let time = self.providers.time().clone();
        let (Some(reader), Some(writer)) = (self.reader.as_mut(), self.writer.as_mut()) else {
            return Err(TransportError::NotConnected);
        };
        let read_buf = self.frames.buffer_mut();
        let signal = &self.shared.signal;
        let out = head.clone().unwrap_or_default();

        let event = tokio::select! {
            biased;
            n = reader.read(read_buf), if can_read => Event::Read(n),
            n = writer.write(&out), if head.is_some() => Event::Wrote(n),
            _ = signal.wait() => Event::Wakeup,
            _ = time.sleep(wait) => Event::Idle,
        };

        match event {
            Event::Read(Ok(0)) => Err(TransportError::ConnectionLost(format!(
                "unable to read additional data from server session 0x{:x}, likely server has closed socket",
                self.session_id()
            ))),
            Event::Read(Ok(n)) => {
                self.metrics.bytes_received += n as u64;
                match self.frames.advance(n)? {
                    Some(body) => self.on_frame(body),
                    None => Ok(()),
                }
            }
            Event::Wrote(Ok(0)) => Err(TransportError::ConnectionLost(
                "socket accepted no bytes".to_string(),
            )),
            Event::Wrote(Ok(n)) => {
                self.on_written(n);
                Ok(())
            }
            Event::Read(Err(e)) | Event::Wrote(Err(e)) => Err(e.into()),
            Event::Wakeup | Event::Idle => Ok(()),
        }
    }

    fn on_frame(&mut self, mut body: Bytes) -> TransportResult<()> {
        self.metrics.record_frame_received();
        self.last_heard = self.now;

        if !self.initialized {
            let response = ConnectResponse::decode(&mut body)?;
            self.shared
                .session_id
                .store(response.session_id, Ordering::Release);
            tracing::info!(
                "Session establishment complete on server {:?}, session id = 0x{:x}, negotiated timeout = {}",
                self.remote_socket_address(),
                response.session_id,
                response.timeout
            );
            self.metrics.record_connection_success_at(self.now);
            self.owner.on_connected(&response);
            self.shared.read_enabled.store(true, Ordering::Release);
            if self.queues.has_outgoing() {
                self.shared.write_enabled.store(true, Ordering::Release);
            }
            self.initialized = true;
            return Ok(());
        }

        let header = ReplyHeader::decode(&mut body)?;
        let reply = match header.xid {
            xid::NOTIFICATION => Reply::Notification { header, body },
            xid::PING => {
                tracing::trace!("Got ping response for session 0x{:x}", self.session_id());
                Reply::Ping { header }
            }
            xid::AUTH => Reply::Auth { header, body },
            reply_xid => match self.queues.pop_pending(reply_xid) {
                Ok(packet) => Reply::Response {
                    packet,
                    header,
                    body,
                },
                Err(Some(expected)) => {
                    return Err(TransportError::XidOutOfOrder {
                        expected,
                        actual: reply_xid,
                    })
                }
                Err(None) => return Err(TransportError::UnexpectedReply { xid: reply_xid }),
            },
        };
        self.owner.on_reply(reply);
        Ok(())
    }

    fn on_written(&mut self, n: usize) {
        self.metrics.bytes_sent += n as u64;
        self.last_send = self.now;

        if let Some(packet) = self.queues.advance_head(n) {
            self.metrics.record_packet_sent();
            if packet.header().is_none() {
                self.handshake_sent = true;
            }
            if packet.awaits_reply() {
                self.queues.push_pending(packet);
            }
        }

        let enable = self.queues.has_outgoing() && (self.initialized || !self.handshake_sent);
        self.shared.write_enabled.store(enable, Ordering::Release);
    }

    async fn on_failure(&mut self, error: &TransportError) {
        if matches!(error, TransportError::Framing(_)) {
            self.metrics.framing_errors += 1;
        }
        if error.is_protocol_violation() {
            tracing::warn!(
                "Protocol violation from server {:?} for session 0x{:x}, closing socket connection: {}",
                self.remote_socket_address(),
                self.session_id(),
                error
            );
        } else {
            tracing::info!(
                "Closing socket connection for session 0x{:x}: {}",
                self.session_id(),
                error
            );
        }
        self.metrics.record_connection_failure_at(self.now);
        self.cleanup().await;
        self.owner.on_disconnected(error);
    }
}

#[async_trait(?Send)]
impl<P: Providers, O: SessionOwner> ConnectionTransport for SocketTransport<P, O> {
    async fn connect(&mut self, endpoint: &ResolvedEndPoint) -> TransportResult<()> {
        if self.is_connected() {
            self.cleanup().await;
        }
        let addr = endpoint.addr();
        self.metrics.record_connection_attempt();
        tracing::info!("Opening socket connection to server {}", endpoint);

        let connect = self.providers.network().connect(addr);
        let attempt = self
            .providers
            .time()
            .timeout(self.config.connect_timeout, connect)
            .await;
        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.update_now();
                self.metrics.record_connection_failure_at(self.now);
                tracing::warn!("Unable to open socket to {}: {}", endpoint, e);
                return Err(TransportError::ConnectFailed {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                self.update_now();
                self.metrics.record_connection_failure_at(self.now);
                tracing::warn!(
                    "Timed out after {:?} opening socket to {}",
                    self.config.connect_timeout,
                    endpoint
                );
                return Err(TransportError::ConnectTimeout {
                    addr,
                    timeout: self.config.connect_timeout,
                });
            }
        };

        self.local_addr = self.providers.network().local_addr(&stream);
        let (reader, writer) = tokio::io::split(stream);
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.shared.remote.set(Some(addr));
        self.shared.set_interest(false, false);
        self.frames.reset();
        self.initialized = false;
        self.handshake_sent = false;
        self.just_connected = true;
        tracing::info!(
            "Socket connection established, initiating session, client: {:?}, server: {}",
            self.local_addr,
            addr
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    async fn do_transport(&mut self, wait: Duration) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        match self.step(wait).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.on_failure(&e).await;
                Err(e)
            }
        }
    }

    fn enable_read_write_only(&self) {
        self.shared.set_interest(true, true);
    }

    fn handle(&self) -> TransportHandle {
        TransportHandle::new(self.shared.clone())
    }

    async fn cleanup(&mut self) {
        self.shared.set_interest(false, false);
        if let Some(mut writer) = self.writer.take() {
            let shutdown = writer.shutdown();
            match self
                .providers
                .time()
                .timeout(self.config.shutdown_timeout, shutdown)
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("Ignoring exception during shutdown output: {}", e),
                Err(_) => tracing::debug!("Ignoring timeout during shutdown output"),
            }
        }
        self.reader = None;
        if let Some(remote) = self.shared.remote.swap(None) {
            tracing::debug!(
                "Closed socket connection to {} for session 0x{:x}",
                remote,
                self.session_id()
            );
        }
        self.local_addr = None;
        let failed = self.queues.reset_for_reconnect(PacketError::ConnectionLoss);
        if failed > 0 {
            tracing::debug!("Failed {} packets awaiting replies on the closed connection", failed);
        }
        self.frames.reset();
        self.just_connected = false;
        self.handshake_sent = false;
        self.initialized = false;
    }

    async fn close(&mut self) {
        let failed = self.queues.fail_all(PacketError::Closing);
        if failed > 0 {
            tracing::debug!("Failed {} queued packets on close", failed);
        }
        self.cleanup().await;
        self.shared.signal.try_signal();
    }

    fn introduce(&mut self, session_id: i64) {
        self.shared.session_id.store(session_id, Ordering::Release);
    }

    fn update_now(&mut self) {
        self.now = self.providers.time().now();
    }

    fn update_last_send_and_heard(&mut self) {
        self.last_send = self.now;
        self.last_heard = self.now;
    }

    fn idle_send(&self) -> Duration {
        self.now.saturating_sub(self.last_send)
    }

    fn idle_recv(&self) -> Duration {
        self.now.saturating_sub(self.last_heard)
    }

    fn sent_count(&self) -> u64 {
        self.metrics.sent_count
    }

    fn recv_count(&self) -> u64 {
        self.metrics.recv_count
    }

    fn remote_socket_address(&self) -> Option<SocketAddr> {
        self.shared.remote.get()
    }

    fn local_socket_address(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }
}
