//! Transport counters.

use std::time::Duration;

/// Counters kept by a transport across all of its connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportMetrics {
    /// Packets fully written
    pub sent_count: u64,

    /// Frames fully read
    pub recv_count: u64,

    /// Bytes written over all connections
    pub bytes_sent: u64,

    /// Bytes read over all connections
    pub bytes_received: u64,

    /// TCP connection attempts
    pub connection_attempts: u64,

    /// Handshakes completed
    pub connections_established: u64,

    /// Failed connection attempts and lost connections
    pub connection_failures: u64,

    /// Connections dropped for an out-of-range frame length
    pub framing_errors: u64,

    /// Time of the last completed handshake
    pub last_connected: Option<Duration>,

    /// Time of the last failure
    pub last_failure: Option<Duration>,
}

impl TransportMetrics {
    /// Zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection attempt.
    pub fn record_connection_attempt(&mut self) {
        self.connection_attempts += 1;
    }

    /// Record a completed handshake at a specific time.
    pub fn record_connection_success_at(&mut self, now: Duration) {
        self.connections_established += 1;
        self.last_connected = Some(now);
    }

    /// Record a failed attempt or a lost connection at a specific time.
    pub fn record_connection_failure_at(&mut self, now: Duration) {
        self.connection_failures += 1;
        self.last_failure = Some(now);
    }

    /// Record a fully written packet.
    pub fn record_packet_sent(&mut self) {
        self.sent_count += 1;
    }

    /// Record a fully read frame.
    pub fn record_frame_received(&mut self) {
        self.recv_count += 1;
    }

    /// Time since the last completed handshake.
    pub fn time_since_last_connection(&self, now: Duration) -> Option<Duration> {
        self.last_connected.map(|t| now.saturating_sub(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_bookkeeping() {
        let mut metrics = TransportMetrics::new();
        metrics.record_connection_attempt();
        metrics.record_connection_failure_at(Duration::from_secs(1));
        metrics.record_connection_attempt();
        metrics.record_connection_success_at(Duration::from_secs(2));

        assert_eq!(metrics.connection_attempts, 2);
        assert_eq!(metrics.connection_failures, 1);
        assert_eq!(metrics.connections_established, 1);
        assert_eq!(
            metrics.time_since_last_connection(Duration::from_secs(5)),
            Some(Duration::from_secs(3))
        );
    }
}
