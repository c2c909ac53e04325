//! End-to-end test of the client transport against a real server.
//!
//! Spawns an in-process TCP server, connects two channel-based clients,
//! and verifies registration, relay, and clean departure through the
//! public client API alone.

use std::time::Duration;

use crosstalk_client::{Transport, transport};
use crosstalk_server::{Server, ServerConfig, ShutdownSignal};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn recv(client: &mut transport::ConnectedClient) -> String {
    timeout(WAIT, client.from_server.recv())
        .await
        .expect("timed out waiting for server")
        .expect("connection closed")
}

#[tokio::test]
async fn two_clients_chat_through_the_relay() {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        poll_interval: Duration::from_millis(50),
        ..ServerConfig::default()
    };
    let server = Server::bind(config).await.expect("bind failed");
    let addr = server.local_addr().expect("no local addr");
    let shutdown = ShutdownSignal::new();
    tokio::spawn(server.run(shutdown.clone()));

    let mut alice =
        transport::connect(&addr.to_string(), Transport::Tcp).await.expect("alice connect");
    let mut bob = transport::connect(&addr.to_string(), Transport::Tcp).await.expect("bob connect");

    alice.to_server.send("NAME:alice".to_string()).await.expect("register alice");
    // Round-trip so alice's registration lands before bob's
    alice.to_server.send("/help".to_string()).await.expect("send help");
    recv(&mut alice).await;

    bob.to_server.send("NAME:bob".to_string()).await.expect("register bob");
    assert_eq!(recv(&mut alice).await, "bob joined the chat");

    alice.to_server.send("hello".to_string()).await.expect("send chat");
    assert_eq!(recv(&mut bob).await, "[alice]: hello");

    bob.to_server.send("/quit".to_string()).await.expect("send quit");
    assert_eq!(recv(&mut alice).await, "bob left the chat");

    // Bob's receive channel closes once the server drops his connection
    let closed = timeout(WAIT, bob.from_server.recv()).await.expect("timed out");
    assert!(closed.is_none());

    alice.stop();
    shutdown.trigger();
}
