//! Error types for transport operations.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::wire::WireError;

/// A frame whose declared length cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Negative, or not below the configured maximum.
    #[error("packet length {len} is out of range (max {max})")]
    PacketLength {
        /// The declared length.
        len: i32,
        /// The configured maximum.
        max: usize,
    },
}

/// Errors that can occur during transport operations.
///
/// Every variant except [`TransportError::NotConnected`] tears the
/// connection down; the owner recovers by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No socket is open.
    #[error("transport is not connected")]
    NotConnected,

    /// The TCP connection could not be established.
    #[error("failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// The endpoint dialed.
        addr: SocketAddr,
        /// The I/O error reported.
        reason: String,
    },

    /// The TCP connection was not established in time.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// The endpoint dialed.
        addr: SocketAddr,
        /// The configured bound.
        timeout: Duration,
    },

    /// The server declared an unacceptable frame length.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// A frame body could not be decoded.
    #[error("malformed record: {0}")]
    Wire(#[from] WireError),

    /// I/O failed or the peer closed the socket.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A reply did not match the head of the pending queue.
    #[error("xid out of order: expected {expected}, got {actual}")]
    XidOutOfOrder {
        /// Xid of the pending head.
        expected: i32,
        /// Xid of the reply.
        actual: i32,
    },

    /// A reply arrived while nothing was pending.
    #[error("reply with xid {xid} while nothing is pending")]
    UnexpectedReply {
        /// Xid of the reply.
        xid: i32,
    },
}

impl TransportError {
    /// The server broke the protocol, as opposed to the network failing.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            TransportError::Framing(_)
                | TransportError::Wire(_)
                | TransportError::XidOutOfOrder { .. }
                | TransportError::UnexpectedReply { .. }
        )
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::ConnectionLost(error.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
