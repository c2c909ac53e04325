//! End-to-end relay behavior over UDP loopback.
//!
//! The datagram path has no standing connections: identity is the source
//! address and every datagram is one whole message. These tests drive the
//! single receive loop with plain sockets.

use std::{net::SocketAddr, time::Duration};

use crosstalk_proto::notice;
use crosstalk_server::{
    Server, ServerConfig, ServerError, SharedRegistry, ShutdownSignal, Transport,
};
use tokio::{net::UdpSocket, task::JoinHandle, time::timeout};

const POLL: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    registry: SharedRegistry,
    shutdown: ShutdownSignal,
    handle: JoinHandle<Result<(), ServerError>>,
}

async fn start_server() -> TestServer {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        transport: Transport::Udp,
        poll_interval: POLL,
        ..ServerConfig::default()
    };
    let server = Server::bind(config).await.expect("bind failed");
    let addr = server.local_addr().expect("no local addr");
    let registry = server.registry();
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(server.run(shutdown.clone()));

    TestServer { addr, registry, shutdown, handle }
}

struct TestPeer {
    socket: UdpSocket,
}

impl TestPeer {
    async fn connect(server: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind failed");
        socket.connect(server).await.expect("connect failed");
        Self { socket }
    }

    async fn connect_as(server: SocketAddr, name: &str) -> Self {
        let peer = Self::connect(server).await;
        peer.send(&format!("NAME:{name}")).await;
        peer
    }

    async fn send(&self, line: &str) {
        self.socket.send(line.as_bytes()).await.expect("send failed");
    }

    async fn recv(&self) -> String {
        let mut buf = vec![0u8; 64 * 1024];
        let len = timeout(WAIT, self.socket.recv(&mut buf))
            .await
            .expect("timed out waiting for server")
            .expect("recv failed");
        String::from_utf8_lossy(&buf[..len]).trim_end().to_string()
    }

    async fn expect_line(&self, want: &str) {
        assert_eq!(self.recv().await, want);
    }
}

#[tokio::test]
async fn datagram_chat_relays_by_source_address() {
    let server = start_server().await;

    let alice = TestPeer::connect_as(server.addr, "alice").await;
    // Round-trip so alice's registration lands before bob's
    alice.send("/help").await;
    alice.expect_line(notice::HELP_TEXT).await;

    let bob = TestPeer::connect_as(server.addr, "bob").await;
    alice.expect_line(&notice::joined("bob")).await;

    bob.send("hi everyone").await;
    alice.expect_line("[bob]: hi everyone").await;

    assert_eq!(server.registry.lock().len(), 2);
}

#[tokio::test]
async fn datagram_registration_is_required_first() {
    let server = start_server().await;

    let stranger = TestPeer::connect(server.addr).await;
    stranger.send("no name yet").await;

    stranger.expect_line(notice::USAGE_HINT).await;
    assert!(server.registry.lock().is_empty());

    // Registering afterwards works; the address maps to one record
    stranger.send("NAME:dave").await;
    stranger.send("/help").await;
    stranger.expect_line(notice::HELP_TEXT).await;
    assert_eq!(server.registry.lock().len(), 1);
}

#[tokio::test]
async fn datagram_quit_removes_the_address() {
    let server = start_server().await;

    let alice = TestPeer::connect_as(server.addr, "alice").await;
    alice.send("/help").await;
    alice.expect_line(notice::HELP_TEXT).await;

    let bob = TestPeer::connect_as(server.addr, "bob").await;
    alice.expect_line(&notice::joined("bob")).await;

    bob.send("/quit").await;
    alice.expect_line(&notice::left("bob")).await;

    // Departed peers are strangers again
    bob.send("am I still here?").await;
    bob.expect_line(notice::USAGE_HINT).await;

    assert_eq!(server.registry.lock().len(), 1);
}

#[tokio::test]
async fn datagram_loop_observes_shutdown() {
    let server = start_server().await;

    let alice = TestPeer::connect_as(server.addr, "alice").await;
    alice.send("/help").await;
    alice.expect_line(notice::HELP_TEXT).await;

    server.shutdown.trigger();

    timeout(Duration::from_secs(1), server.handle)
        .await
        .expect("server did not stop in time")
        .expect("server task panicked")
        .expect("server returned an error");
}
