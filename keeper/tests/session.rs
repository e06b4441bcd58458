//! End-to-end tests driving the transport against fake ensemble members
//! over real loopback TCP.
//!
//! Tests verify that:
//! - Replies are dispatched in send order whatever the read chunking
//! - A session survives failover to another member, keeping its id, and
//!   requests queued while disconnected go out on the new connection
//! - Pings are answered out of band
//! - Another thread can wake a transport blocked in a long wait

mod support;

use std::cell::{Cell, RefCell};
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use keeper::{
    ConnectRequest, ConnectResponse, ConnectionTransport, DynamicHostProvider, HostAndPort,
    HostProviderConfig, OpCode, Packet, PacketQueues, ProviderBundle, Reply,
    ResolvedEndPoint, Response, ResponseFuture, SeededRandomProvider, SessionOwner,
    SocketTransport, TokioLookupProvider, TokioNetworkProvider, TokioProviders,
    TokioTaskProvider, TokioTimeProvider, TransportConfig, TransportError,
};
use support::{dead_port, FakeServer};

type TestProviders = ProviderBundle<
    TokioNetworkProvider,
    TokioTimeProvider,
    TokioTaskProvider,
    SeededRandomProvider,
    TokioLookupProvider,
>;

const WAIT: Duration = Duration::from_millis(20);
const SPIN: Duration = Duration::from_millis(10);

/// Create a local tokio runtime for tests.
fn local_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("Failed to build local runtime")
}

fn run_local<F: std::future::Future>(future: F) -> F::Output {
    let _ = tracing_subscriber::fmt::try_init();
    tokio::task::LocalSet::new().block_on(&local_runtime(), future)
}

/// Minimal session layer: resumes its session on every connection and
/// fails in-flight work on disconnect.
#[derive(Default)]
struct Session {
    queues: Arc<PacketQueues>,
    session_id: Cell<i64>,
    password: RefCell<Bytes>,
    handshakes: Cell<u32>,
    disconnects: RefCell<Vec<TransportError>>,
    responses: RefCell<Vec<i32>>,
    pings: Cell<u32>,
}

impl SessionOwner for Session {
    fn prime_connection(&self, queues: &PacketQueues) {
        queues.enqueue_first(Packet::handshake(&ConnectRequest {
            timeout: 10_000,
            session_id: self.session_id.get(),
            password: self.password.borrow().clone(),
            ..Default::default()
        }));
    }

    fn on_connected(&self, response: &ConnectResponse) {
        self.session_id.set(response.session_id);
        *self.password.borrow_mut() = response.password.clone();
        self.handshakes.set(self.handshakes.get() + 1);
    }

    fn on_reply(&self, reply: Reply) {
        match reply {
            Reply::Response {
                packet,
                header,
                body,
            } => {
                self.responses.borrow_mut().push(header.xid);
                packet.complete(Ok(Response { header, body }));
            }
            Reply::Ping { .. } => self.pings.set(self.pings.get() + 1),
            Reply::Notification { .. } | Reply::Auth { .. } => {}
        }
    }

    fn on_disconnected(&self, error: &TransportError) {
        self.disconnects.borrow_mut().push(error.clone());
    }
}

struct Client {
    session: Rc<Session>,
    hosts: DynamicHostProvider<TestProviders>,
    transport: SocketTransport<TestProviders, Session>,
}

impl Client {
    fn new(ports: &[u16]) -> Self {
        let providers = TokioProviders::new().with_random(SeededRandomProvider::new(7));
        let hosts = ports
            .iter()
            .map(|port| HostAndPort::new("127.0.0.1", *port))
            .collect();
        let hosts = DynamicHostProvider::new(providers.clone(), hosts, HostProviderConfig::default())
            .expect("hosts");
        let session = Rc::new(Session::default());
        let transport = SocketTransport::new(
            providers,
            session.clone(),
            session.queues.clone(),
            TransportConfig::local_network(),
        );
        Self {
            session,
            hosts,
            transport,
        }
    }

    /// Walk the host provider until a handshake completes.
    async fn connect(&mut self) -> ResolvedEndPoint {
        for _ in 0..20 {
            let endpoint = self.hosts.next(SPIN).await.expect("resolvable");
            if self.transport.connect(&endpoint).await.is_err() {
                continue;
            }
            let before = self.session.handshakes.get();
            while self.transport.do_transport(WAIT).await.is_ok() {
                if self.session.handshakes.get() > before {
                    self.hosts.on_connected();
                    return endpoint;
                }
            }
        }
        panic!("no ensemble member accepted a session");
    }

    fn request(&self, body: &'static str) -> ResponseFuture {
        let (packet, rx) = Packet::request(OpCode::GetData, Bytes::from_static(body.as_bytes()));
        self.session.queues.enqueue(packet);
        rx
    }

    async fn drive_until(&mut self, done: impl Fn(&Session) -> bool) {
        for _ in 0..5_000 {
            if done(&self.session) {
                return;
            }
            self.transport.do_transport(WAIT).await.expect("transport");
        }
        panic!("transport made no progress");
    }
}

fn body_of(rx: &mut ResponseFuture) -> Bytes {
    rx.try_recv().expect("completed").expect("response").body
}

#[test]
fn test_replies_dispatched_in_send_order_under_bytewise_chunking() {
    run_local(async {
        let server = FakeServer::start(0x51, 1).await;
        let mut client = Client::new(&[server.addr().port()]);
        client.connect().await;

        let mut receivers = vec![
            client.request("p1"),
            client.request("p2"),
            client.request("p3"),
        ];
        client.drive_until(|s| s.responses.borrow().len() == 3).await;

        let xids = client.session.responses.borrow().clone();
        assert!(xids.windows(2).all(|w| w[0] < w[1]), "xids {xids:?}");
        let bodies: Vec<Bytes> = receivers.iter_mut().map(body_of).collect();
        assert_eq!(bodies, vec!["p1", "p2", "p3"]);
        assert_eq!(client.transport.recv_count(), 4);
    });
}

#[test]
fn test_session_survives_failover() {
    run_local(async {
        let first = FakeServer::start(0x77, 7).await;
        let second = FakeServer::start(0x99, 7).await;
        let mut client = Client::new(&[first.addr().port(), second.addr().port()]);

        let connected = client.connect().await;
        let session_id = client.session.session_id.get();
        let mut rx = client.request("before");
        client.drive_until(|s| !s.responses.borrow().is_empty()).await;
        assert_eq!(body_of(&mut rx), "before");

        let (live, dead) = if connected.addr() == first.addr() {
            (&second, &first)
        } else {
            (&first, &second)
        };
        dead.stop();
        let mut lost = None;
        for _ in 0..5_000 {
            if let Err(e) = client.transport.do_transport(WAIT).await {
                lost = Some(e);
                break;
            }
        }
        assert!(matches!(lost, Some(TransportError::ConnectionLost(_))));
        assert!(!client.transport.is_connected());
        assert_eq!(client.session.disconnects.borrow().len(), 1);

        let mut queued = client.request("after");
        let reconnected = client.connect().await;
        assert_eq!(reconnected.addr(), live.addr());
        assert_eq!(client.session.session_id.get(), session_id);

        let resumed = live.handshakes();
        let last = resumed.last().expect("handshake");
        assert_eq!(last.session_id, session_id);
        assert_eq!(last.password.as_ref(), b"fake-session-pwd");

        client.drive_until(|s| s.responses.borrow().len() == 2).await;
        assert_eq!(body_of(&mut queued), "after");
    });
}

#[test]
fn test_unreachable_member_is_skipped() {
    run_local(async {
        let server = FakeServer::start(0x12, 64).await;
        let mut client = Client::new(&[dead_port().await, server.addr().port()]);

        let endpoint = client.connect().await;
        assert_eq!(endpoint.addr(), server.addr());
        assert_eq!(client.hosts.last_endpoint(), Some(&endpoint));
    });
}

#[test]
fn test_ping_answered_out_of_band() {
    run_local(async {
        let server = FakeServer::start(0x33, 64).await;
        let mut client = Client::new(&[server.addr().port()]);
        client.connect().await;

        client.session.queues.enqueue(Packet::ping());
        client.transport.handle().enable_write();
        client.drive_until(|s| s.pings.get() == 1).await;

        assert_eq!(client.session.queues.pending_len(), 0);
        assert!(client.session.responses.borrow().is_empty());
        assert_eq!(client.transport.idle_recv(), Duration::ZERO);
    });
}

#[test]
fn test_enqueue_from_another_thread_wakes_transport() {
    run_local(async {
        let server = FakeServer::start(0x44, 64).await;
        let mut client = Client::new(&[server.addr().port()]);
        client.connect().await;

        let (packet, mut rx) = Packet::request(OpCode::Exists, Bytes::from_static(b"remote"));
        let queues = client.session.queues.clone();
        let handle = client.transport.handle();
        let enqueuer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            queues.enqueue(packet);
            handle.enable_write();
        });

        let started = Instant::now();
        client
            .transport
            .do_transport(Duration::from_secs(30))
            .await
            .expect("woken pass");
        assert!(started.elapsed() < Duration::from_secs(10));
        enqueuer.join().expect("enqueuer thread");

        client.drive_until(|s| s.responses.borrow().len() == 1).await;
        assert_eq!(body_of(&mut rx), "remote");
    });
}

#[test]
fn test_remote_address_tracks_connection() {
    run_local(async {
        let server = FakeServer::start(0x66, 64).await;
        let mut client = Client::new(&[server.addr().port()]);
        let endpoint = client.connect().await;

        let handle = client.transport.handle();
        assert_eq!(handle.remote_socket_address(), Some(endpoint.addr()));
        assert_eq!(handle.session_id(), 0x66);
        assert!(client.transport.local_socket_address().is_some());
        assert_eq!(
            endpoint.addr().ip(),
            IpAddr::from([127, 0, 0, 1])
        );

        client.transport.close().await;
        assert_eq!(handle.remote_socket_address(), None);
        assert_eq!(client.transport.metrics().connections_established, 1);
    });
}
