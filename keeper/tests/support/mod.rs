//! In-process fake ensemble member speaking the session handshake.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use bytes::{BufMut, Bytes, BytesMut};
use keeper::{ConnectRequest, ConnectResponse, OpCode, ReplyHeader, RequestHeader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// A server that completes handshakes and echoes every request body.
///
/// A fresh session gets `session_id`; a resumed session keeps its id.
/// Replies are written `chunk` bytes at a time.
pub struct FakeServer {
    addr: SocketAddr,
    stop: watch::Sender<bool>,
    handshakes: Rc<RefCell<Vec<ConnectRequest>>>,
}

impl FakeServer {
    /// Bind on an ephemeral loopback port and start accepting.
    ///
    /// Must be called from within a [`tokio::task::LocalSet`].
    pub async fn start(session_id: i64, chunk: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (stop, stop_rx) = watch::channel(false);
        let handshakes = Rc::new(RefCell::new(Vec::new()));
        tokio::task::spawn_local(accept_loop(
            listener,
            stop_rx,
            handshakes.clone(),
            session_id,
            chunk,
        ));
        Self {
            addr,
            stop,
            handshakes,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handshakes received so far, oldest first.
    pub fn handshakes(&self) -> Vec<ConnectRequest> {
        self.handshakes.borrow().clone()
    }

    /// Stop accepting and drop every open connection.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

/// A loopback port nothing listens on.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr").port()
}

async fn accept_loop(
    listener: TcpListener,
    mut stop: watch::Receiver<bool>,
    handshakes: Rc<RefCell<Vec<ConnectRequest>>>,
    session_id: i64,
    chunk: usize,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::task::spawn_local(serve(
                        stream,
                        stop.clone(),
                        handshakes.clone(),
                        session_id,
                        chunk,
                    ));
                }
                Err(_) => break,
            },
        }
    }
}

async fn serve(
    mut stream: TcpStream,
    mut stop: watch::Receiver<bool>,
    handshakes: Rc<RefCell<Vec<ConnectRequest>>>,
    session_id: i64,
    chunk: usize,
) {
    let Some(mut handshake) = read_frame(&mut stream).await else {
        return;
    };
    let Ok(request) = ConnectRequest::decode(&mut handshake) else {
        return;
    };
    let assigned = if request.session_id == 0 {
        session_id
    } else {
        request.session_id
    };
    handshakes.borrow_mut().push(request);

    let mut body = BytesMut::new();
    ConnectResponse {
        protocol_version: 0,
        timeout: 10_000,
        session_id: assigned,
        password: Bytes::from_static(b"fake-session-pwd"),
        read_only: false,
    }
    .encode(&mut body);
    if write_chunked(&mut stream, &framed(&body), chunk).await.is_err() {
        return;
    }

    loop {
        let frame = tokio::select! {
            _ = stop.changed() => return,
            frame = read_frame(&mut stream) => frame,
        };
        let Some(mut body) = frame else {
            return;
        };
        let Ok(header) = RequestHeader::decode(&mut body) else {
            return;
        };
        let echoed = if header.op == OpCode::Ping {
            Bytes::new()
        } else {
            body
        };
        let mut reply = BytesMut::new();
        ReplyHeader {
            xid: header.xid,
            zxid: 1,
            err: 0,
        }
        .encode(&mut reply);
        reply.put_slice(&echoed);
        if write_chunked(&mut stream, &framed(&reply), chunk).await.is_err() {
            return;
        }
    }
}

async fn read_frame(stream: &mut TcpStream) -> Option<Bytes> {
    let len = stream.read_i32().await.ok()?;
    let mut body = vec![0u8; usize::try_from(len).ok()?];
    stream.read_exact(&mut body).await.ok()?;
    Some(Bytes::from(body))
}

fn framed(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(4 + payload.len());
    out.put_i32(payload.len() as i32);
    out.put_slice(payload);
    out.freeze()
}

async fn write_chunked(stream: &mut TcpStream, data: &[u8], chunk: usize) -> std::io::Result<()> {
    for piece in data.chunks(chunk.max(1)) {
        stream.write_all(piece).await?;
        stream.flush().await?;
    }
    Ok(())
}
