//! The session owner driving a transport.

use bytes::Bytes;

use super::error::TransportError;
use crate::packet::{Packet, PacketQueues};
use crate::wire::{ConnectResponse, ReplyHeader};

/// A decoded reply, routed by its xid.
#[derive(Debug)]
pub enum Reply {
    /// A watch notification.
    Notification {
        /// Reply header; xid is the notification xid.
        header: ReplyHeader,
        /// The event record.
        body: Bytes,
    },
    /// A ping reply.
    Ping {
        /// Reply header.
        header: ReplyHeader,
    },
    /// An authentication reply.
    Auth {
        /// Reply header; a non-zero `err` means authentication failed.
        header: ReplyHeader,
        /// The reply record.
        body: Bytes,
    },
    /// The reply to the request at the head of the pending queue.
    Response {
        /// The matched request, ready to be completed.
        packet: Packet,
        /// Reply header.
        header: ReplyHeader,
        /// The reply record.
        body: Bytes,
    },
}

/// Callbacks a transport makes into the session layer.
///
/// All callbacks run inside [`do_transport`](super::ConnectionTransport::do_transport)
/// and must not block.
pub trait SessionOwner {
    /// A socket was just connected: queue the handshake, followed by
    /// anything that must precede queued requests.
    fn prime_connection(&self, queues: &PacketQueues);

    /// The handshake response arrived.
    fn on_connected(&self, response: &ConnectResponse);

    /// A reply arrived after the handshake.
    fn on_reply(&self, reply: Reply);

    /// The connection was torn down because of `error`.
    ///
    /// Packets that were awaiting replies have already been failed with
    /// [`PacketError::ConnectionLoss`](crate::PacketError::ConnectionLoss).
    /// Unsent packets stay queued, rewound to their first byte, and go out
    /// after the next handshake unless the owner fails them here.
    fn on_disconnected(&self, error: &TransportError) {
        let _ = error;
    }
}
