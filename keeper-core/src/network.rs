//! Network provider abstraction for real and in-memory sockets.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

/// Provider trait for opening client connections.
///
/// Single-core design - no Send bounds needed.
/// Clone allows sharing providers across transports efficiently.
#[async_trait(?Send)]
pub trait NetworkProvider: Clone {
    /// The stream type for this provider.
    type TcpStream: AsyncRead + AsyncWrite + Unpin + 'static;

    /// Connect to a remote address.
    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::TcpStream>;

    /// Local address of a connected stream, when the stream has one.
    fn local_addr(&self, _stream: &Self::TcpStream) -> Option<SocketAddr> {
        None
    }
}

/// Real Tokio networking implementation.
///
/// Streams are opened with `TCP_NODELAY` so small request frames are not
/// held back by Nagle's algorithm.
#[derive(Debug, Clone, Default)]
pub struct TokioNetworkProvider;

impl TokioNetworkProvider {
    /// Create a new Tokio network provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl NetworkProvider for TokioNetworkProvider {
    type TcpStream = tokio::net::TcpStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::TcpStream> {
        let stream = tokio::net::TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn local_addr(&self, stream: &Self::TcpStream) -> Option<SocketAddr> {
        stream.local_addr().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_reports_local_addr() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("listener addr");

        let network = TokioNetworkProvider::new();
        let (stream, accepted) = tokio::join!(network.connect(addr), listener.accept());
        let stream = stream.expect("connect");
        let (_server_side, client_addr) = accepted.expect("accept");

        assert_eq!(network.local_addr(&stream), Some(client_addr));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("listener addr");
        drop(listener);

        assert!(TokioNetworkProvider::new().connect(addr).await.is_err());
    }
}
