//! Packets and the outgoing/pending queues.
//!
//! A [`Packet`] is created by the session owner and enqueued on
//! [`PacketQueues`]. The transport builds its wire buffer on the first write
//! attempt, assigning the xid at that moment, and moves it to the pending
//! queue once the buffer is flushed. The reply completes the packet's
//! one-shot channel.
//!
//! Each queue sits behind its own lock, held only for the queue operation
//! itself and never across I/O.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::wire::{frame, ConnectRequest, OpCode, ReplyHeader, RequestHeader};

/// Why a packet was failed without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    /// The connection carrying the packet was lost.
    #[error("connection loss")]
    ConnectionLoss,

    /// The session is closing.
    #[error("session closing")]
    Closing,
}

/// A reply matched to its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The reply header.
    pub header: ReplyHeader,
    /// The undecoded reply record.
    pub body: Bytes,
}

/// Receives the outcome of a request packet.
pub type ResponseFuture = oneshot::Receiver<Result<Response, PacketError>>;

type Completion = oneshot::Sender<Result<Response, PacketError>>;

/// A request on its way to the server.
#[derive(Debug)]
pub struct Packet {
    header: Option<RequestHeader>,
    request: Bytes,
    wire: Option<Bytes>,
    completion: Option<Completion>,
}

impl Packet {
    /// A request whose reply is correlated through the pending queue.
    pub fn request(op: OpCode, body: Bytes) -> (Self, ResponseFuture) {
        let (tx, rx) = oneshot::channel();
        let packet = Self {
            header: Some(RequestHeader::new(op)),
            request: body,
            wire: None,
            completion: Some(tx),
        };
        (packet, rx)
    }

    /// A keepalive ping.
    pub fn ping() -> Self {
        Self {
            header: Some(RequestHeader::ping()),
            request: Bytes::new(),
            wire: None,
            completion: None,
        }
    }

    /// An authentication request; its reply goes straight to the owner.
    pub fn auth(body: Bytes) -> Self {
        Self {
            header: Some(RequestHeader::auth()),
            request: body,
            wire: None,
            completion: None,
        }
    }

    /// The session handshake. Carries no request header.
    pub fn handshake(request: &ConnectRequest) -> Self {
        let mut body = BytesMut::new();
        request.encode(&mut body);
        Self {
            header: None,
            request: body.freeze(),
            wire: None,
            completion: None,
        }
    }

    /// The request header, if any.
    pub fn header(&self) -> Option<&RequestHeader> {
        self.header.as_ref()
    }

    /// The correlation id once assigned.
    pub fn xid(&self) -> Option<i32> {
        self.header.map(|h| h.xid)
    }

    /// Pings and auth requests never enter the pending queue.
    pub fn is_ping_or_auth(&self) -> bool {
        matches!(
            self.header.map(|h| h.op),
            Some(OpCode::Ping) | Some(OpCode::Auth)
        )
    }

    /// Whether the packet moves to the pending queue once written.
    ///
    /// The handshake, pings and auth requests are answered out of band.
    pub fn awaits_reply(&self) -> bool {
        self.header.is_some() && !self.is_ping_or_auth()
    }

    /// Whether the wire buffer has been built.
    pub fn is_built(&self) -> bool {
        self.wire.is_some()
    }

    /// Unsent bytes of the wire buffer, building it on first use.
    pub(crate) fn wire_buffer(&mut self, xids: &AtomicI32) -> Bytes {
        if let Some(wire) = &self.wire {
            return wire.clone();
        }
        let ping_or_auth = self.is_ping_or_auth();
        if let Some(header) = self.header.as_mut() {
            if !ping_or_auth {
                header.xid = next_xid(xids);
            }
        }
        let wire = frame(self.header.as_ref(), &self.request);
        self.wire = Some(wire.clone());
        wire
    }

    /// Restore a partly written wire buffer to its first byte.
    ///
    /// The assigned xid is kept.
    pub(crate) fn rewind(&mut self) {
        if self.wire.is_some() {
            self.wire = Some(frame(self.header.as_ref(), &self.request));
        }
    }

    /// Consume `n` written bytes. Returns `true` once nothing is left.
    pub(crate) fn advance(&mut self, n: usize) -> bool {
        match self.wire.as_mut() {
            Some(wire) => {
                wire.advance(n.min(wire.len()));
                wire.is_empty()
            }
            None => false,
        }
    }

    /// Complete the packet. A dropped receiver is ignored.
    pub fn complete(mut self, result: Result<Response, PacketError>) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(result);
        }
    }
}

/// Take the next xid. Wraps from `i32::MAX` to 1, never reaching the
/// reserved negative xids.
fn next_xid(xids: &AtomicI32) -> i32 {
    match xids.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |xid| {
        Some(xid.checked_add(1).unwrap_or(1))
    }) {
        Ok(xid) | Err(xid) => xid,
    }
}

/// The two ordered queues of a session plus its xid counter.
#[derive(Debug)]
pub struct PacketQueues {
    outgoing: Mutex<VecDeque<Packet>>,
    pending: Mutex<VecDeque<Packet>>,
    xid: AtomicI32,
}

impl Default for PacketQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketQueues {
    /// Empty queues; the first assigned xid is 1.
    pub fn new() -> Self {
        Self {
            outgoing: Mutex::new(VecDeque::new()),
            pending: Mutex::new(VecDeque::new()),
            xid: AtomicI32::new(1),
        }
    }

    /// Append a packet to the outgoing queue.
    ///
    /// Callers on other threads follow up with
    /// [`TransportHandle::enable_write`](crate::TransportHandle::enable_write).
    pub fn enqueue(&self, packet: Packet) {
        self.outgoing.lock().push_back(packet);
    }

    /// Put a packet ahead of everything queued, e.g. the handshake.
    pub fn enqueue_first(&self, packet: Packet) {
        self.outgoing.lock().push_front(packet);
    }

    /// Number of packets waiting to be written.
    pub fn outgoing_len(&self) -> usize {
        self.outgoing.lock().len()
    }

    /// Number of packets waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether anything is waiting to be written.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.lock().is_empty()
    }

    /// The next xid that will be assigned.
    pub fn peek_xid(&self) -> i32 {
        self.xid.load(Ordering::Relaxed)
    }

    /// Unsent bytes of the head packet, building its buffer if needed.
    pub(crate) fn outgoing_head_buffer(&self) -> Option<Bytes> {
        let mut outgoing = self.outgoing.lock();
        outgoing.front_mut().map(|p| p.wire_buffer(&self.xid))
    }

    /// Record `n` bytes of the head packet as written.
    ///
    /// Returns the packet once it is fully flushed.
    pub(crate) fn advance_head(&self, n: usize) -> Option<Packet> {
        let mut outgoing = self.outgoing.lock();
        let flushed = outgoing.front_mut().is_some_and(|p| p.advance(n));
        if flushed {
            outgoing.pop_front()
        } else {
            None
        }
    }

    pub(crate) fn push_pending(&self, packet: Packet) {
        self.pending.lock().push_back(packet);
    }

    /// Pop the pending head if its xid matches.
    ///
    /// On mismatch the head stays queued and its xid is returned; `Err(None)`
    /// means nothing was pending.
    pub(crate) fn pop_pending(&self, xid: i32) -> Result<Packet, Option<i32>> {
        let mut pending = self.pending.lock();
        match pending.front().map(|p| p.xid()) {
            None => Err(None),
            Some(head) if head == Some(xid) => pending.pop_front().ok_or(None),
            Some(head) => Err(head),
        }
    }

    /// Make the queues safe to drain on a new connection.
    ///
    /// Pending packets may already have been applied by the server, so they
    /// are failed with `error`. Handshakes of the dead connection are
    /// dropped. Outgoing packets stay queued in order, rewound so the next
    /// connection writes whole frames. Returns how many packets were failed.
    pub(crate) fn reset_for_reconnect(&self, error: PacketError) -> usize {
        let pending: Vec<Packet> = self.pending.lock().drain(..).collect();
        {
            let mut outgoing = self.outgoing.lock();
            outgoing.retain(|p| p.header.is_some());
            outgoing.iter_mut().for_each(Packet::rewind);
        }
        let count = pending.len();
        for packet in pending {
            packet.complete(Err(error));
        }
        count
    }

    /// Fail every pending and outgoing packet with `error`.
    ///
    /// Pending packets are failed first, in send order. Returns how many
    /// packets were failed.
    pub fn fail_all(&self, error: PacketError) -> usize {
        let pending: Vec<Packet> = self.pending.lock().drain(..).collect();
        let outgoing: Vec<Packet> = self.outgoing.lock().drain(..).collect();
        let count = pending.len() + outgoing.len();
        for packet in pending.into_iter().chain(outgoing) {
            packet.complete(Err(error));
        }
        count
    }
}
