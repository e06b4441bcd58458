//! Configuration for the socket transport.

use std::time::Duration;

use crate::wire::DEFAULT_MAX_PACKET_LEN;

/// Configuration for transport behavior.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Frames declaring this many bytes or more are rejected
    pub max_packet_len: usize,

    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,

    /// Bound on the best-effort write shutdown during cleanup
    pub shutdown_timeout: Duration,

    /// Initial capacity of the reusable frame body buffer
    pub initial_message_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
            connect_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_millis(100),
            initial_message_capacity: 256,
        }
    }
}

impl TransportConfig {
    /// Create a configuration for low-latency local networking.
    pub fn local_network() -> Self {
        Self {
            connect_timeout: Duration::from_millis(500),
            shutdown_timeout: Duration::from_millis(10),
            ..Self::default()
        }
    }

    /// Override the maximum frame length.
    pub fn with_max_packet_len(mut self, max_packet_len: usize) -> Self {
        self.max_packet_len = max_packet_len;
        self
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
