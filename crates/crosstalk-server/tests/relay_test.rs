//! End-to-end relay behavior over TCP loopback.
//!
//! Each test binds an ephemeral port, runs the real server, and drives it
//! with raw socket clients so registration, fan-out, departure notices,
//! and shutdown are exercised exactly as a deployed server would see
//! them. The poll interval is shortened so shutdown-observation tests
//! stay fast.

use std::{net::SocketAddr, time::Duration};

use crosstalk_proto::{LineReader, notice};
use crosstalk_server::{
    Server, ServerConfig, ServerError, SharedRegistry, ShutdownSignal, Transport,
};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    task::JoinHandle,
    time::timeout,
};

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
        transport: Transport::Tcp,
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

struct TestClient {
    reader: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        let (read_half, write_half) = stream.into_split();
        Self { reader: LineReader::new(read_half), writer: write_half }
    }

    async fn connect_as(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(&format!("NAME:{name}")).await;
        client
    }

    async fn send(&mut self, line: &str) {
        let mut data = line.as_bytes().to_vec();
        data.push(b'\n');
        self.writer.write_all(&data).await.expect("send failed");
    }

    /// Next line from the server, or `None` if the connection closed.
    async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.reader.next_line())
            .await
            .expect("timed out waiting for server")
            .expect("read failed")
    }

    async fn expect_line(&mut self, want: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(want));
    }

    /// Wait for the server to close this connection, ignoring any
    /// departure notices still in flight.
    async fn expect_closed(&mut self) {
        while self.recv().await.is_some() {}
    }
}

#[tokio::test]
async fn chat_relays_to_other_members_only() {
    let server = start_server().await;

    let mut alice = TestClient::connect_as(server.addr, "alice").await;
    let mut bob = TestClient::connect_as(server.addr, "bob").await;

    // Once alice hears bob's join notice, both registrations are live
    alice.expect_line(&notice::joined("bob")).await;

    alice.send("hello").await;
    bob.expect_line("[alice]: hello").await;

    // Alice never sees her own echo: the next line she receives is bob's
    // reply, not her own message
    bob.send("hey alice").await;
    alice.expect_line("[bob]: hey alice").await;

    assert_eq!(server.registry.lock().len(), 2);
}

#[tokio::test]
async fn join_notice_excludes_the_joiner() {
    let server = start_server().await;

    let mut alice = TestClient::connect_as(server.addr, "alice").await;
    let mut bob = TestClient::connect_as(server.addr, "bob").await;

    alice.expect_line(&notice::joined("bob")).await;

    // Bob's first line must be chat, never his own join notice
    alice.send("welcome").await;
    bob.expect_line("[alice]: welcome").await;
}

#[tokio::test]
async fn malformed_first_message_terminates_the_session() {
    let server = start_server().await;

    let mut intruder = TestClient::connect(server.addr).await;
    intruder.send("hello without registering").await;

    intruder.expect_line(notice::USAGE_HINT).await;
    // Server closes the connection after the hint
    assert_eq!(intruder.recv().await, None);

    // The failed session never appears in the registry
    assert!(server.registry.lock().is_empty());
}

#[tokio::test]
async fn quit_departs_cleanly_and_notifies_others() {
    let server = start_server().await;

    let mut alice = TestClient::connect_as(server.addr, "alice").await;
    let mut bob = TestClient::connect_as(server.addr, "bob").await;
    alice.expect_line(&notice::joined("bob")).await;

    bob.send("/quit").await;

    alice.expect_line(&notice::left("bob")).await;
    assert_eq!(bob.recv().await, None);
    assert_eq!(server.registry.lock().len(), 1);
}

#[tokio::test]
async fn severed_connection_is_announced_exactly_once() {
    let server = start_server().await;

    let mut alice = TestClient::connect_as(server.addr, "alice").await;
    let mut bob = TestClient::connect_as(server.addr, "bob").await;
    let mut carol = TestClient::connect_as(server.addr, "carol").await;

    alice.expect_line(&notice::joined("bob")).await;
    alice.expect_line(&notice::joined("carol")).await;
    bob.expect_line(&notice::joined("carol")).await;

    // Sever alice without a quit message
    drop(alice);

    bob.expect_line(&notice::left("alice")).await;
    carol.expect_line(&notice::left("alice")).await;

    // No duplicate departure notice: the very next line carol sees is
    // bob's chat
    bob.send("ping").await;
    carol.expect_line("[bob]: ping").await;

    assert_eq!(server.registry.lock().len(), 2);
}

#[tokio::test]
async fn help_and_unknown_commands_reply_without_relaying() {
    let server = start_server().await;

    let mut alice = TestClient::connect_as(server.addr, "alice").await;
    let mut bob = TestClient::connect_as(server.addr, "bob").await;
    alice.expect_line(&notice::joined("bob")).await;

    bob.send("/help").await;
    bob.expect_line(notice::HELP_TEXT).await;

    bob.send("/frobnicate").await;
    bob.expect_line(notice::UNKNOWN_COMMAND).await;

    // Neither command reached alice; her next line is bob's chat
    bob.send("done").await;
    alice.expect_line("[bob]: done").await;
}

#[tokio::test]
async fn shutdown_terminates_sessions_and_stops_accepting() {
    let server = start_server().await;

    let mut alice = TestClient::connect_as(server.addr, "alice").await;
    let mut bob = TestClient::connect_as(server.addr, "bob").await;
    alice.expect_line(&notice::joined("bob")).await;

    server.shutdown.trigger();

    // The accept loop returns within one poll interval
    timeout(Duration::from_secs(1), server.handle)
        .await
        .expect("server did not stop in time")
        .expect("server task panicked")
        .expect("server returned an error");

    // Both sessions observe the signal and close their connections;
    // whichever terminates first may still deliver a departure notice to
    // the other before the close lands
    alice.expect_closed().await;
    bob.expect_closed().await;

    // No leaked registry entries
    assert!(server.registry.lock().is_empty());

    // Listener is released; new connections are refused
    assert!(TcpStream::connect(server.addr).await.is_err());
}
