//! Crosstalk relay server.
//!
//! A minimal multi-client chat relay: clients register a display name,
//! then every chat line fans out to all other registered members.
//!
//! # Architecture
//!
//! - [`ClientRegistry`]: the only shared mutable state, a locked map from
//!   connection identity to member record
//! - [`Broadcaster`]: snapshot-then-write fan-out that evicts members
//!   whose delivery fails
//! - Session handler: one task per TCP connection walking
//!   `AwaitingName -> Active -> Terminated`
//! - [`Server`]: accept loop (TCP) or single datagram loop (UDP)
//! - [`ShutdownSignal`]: one-shot latch observed by every loop within one
//!   poll interval
//!
//! Cancellation is cooperative: every blocking point is a bounded wait
//! followed by a check of the shutdown latch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broadcast;
mod error;
mod registry;
mod session;
mod shutdown;
mod udp;

use std::{net::SocketAddr, sync::Arc, time::Duration};

pub use broadcast::Broadcaster;
use crosstalk_proto::MAX_LINE_LEN;
pub use error::ServerError;
pub use registry::{
    ClientId, ClientRecord, ClientRegistry, Outbound, RegisterError, SharedRegistry,
};
use session::SessionContext;
pub use shutdown::ShutdownSignal;
use tokio::{
    net::{TcpListener, UdpSocket},
    time::timeout,
};
use udp::UdpRelay;

/// Transport the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Reliable stream transport; one session task per connection.
    Tcp,
    /// Datagram transport; a single receive loop keyed by source address.
    Udp,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub bind_address: String,
    /// Transport to serve.
    pub transport: Transport,
    /// Bounded-wait interval between shutdown checks.
    pub poll_interval: Duration,
    /// Maximum accepted line length for stream reads.
    pub max_line_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            transport: Transport::Tcp,
            poll_interval: Duration::from_secs(1),
            max_line_len: MAX_LINE_LEN,
        }
    }
}

/// Bound listening endpoint.
enum Endpoint {
    Tcp(TcpListener),
    Udp(Arc<UdpSocket>),
}

/// Crosstalk relay server.
///
/// Owns the listening endpoint and the connection registry. The registry
/// is constructed once per server and handed by reference (shared handle)
/// to the broadcaster and every session.
pub struct Server {
    endpoint: Endpoint,
    config: ServerConfig,
    registry: SharedRegistry,
}

impl Server {
    /// Bind the listening endpoint.
    ///
    /// Bind failure is the only process-fatal error in the system.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let endpoint = match config.transport {
            Transport::Tcp => {
                let listener = TcpListener::bind(&config.bind_address).await.map_err(|source| {
                    ServerError::Bind { addr: config.bind_address.clone(), source }
                })?;
                Endpoint::Tcp(listener)
            },
            Transport::Udp => {
                let socket = UdpSocket::bind(&config.bind_address).await.map_err(|source| {
                    ServerError::Bind { addr: config.bind_address.clone(), source }
                })?;
                Endpoint::Udp(Arc::new(socket))
            },
        };

        Ok(Self { endpoint, config, registry: SharedRegistry::new() })
    }

    /// Local address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = match &self.endpoint {
            Endpoint::Tcp(listener) => listener.local_addr()?,
            Endpoint::Udp(socket) => socket.local_addr()?,
        };
        Ok(addr)
    }

    /// Shared handle to the connection registry.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Serve until the shutdown signal is observed.
    ///
    /// On shutdown the endpoint stops accepting and is released without
    /// waiting for in-flight sessions; each session observes the same
    /// signal within one poll interval and cleans itself up.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        match self.endpoint {
            Endpoint::Tcp(listener) => {
                run_accept_loop(listener, self.registry, &self.config, shutdown).await
            },
            Endpoint::Udp(socket) => {
                UdpRelay::new(socket, self.registry, shutdown, self.config.poll_interval)
                    .run()
                    .await
            },
        }
    }
}

/// TCP accept loop: spawn one session task per accepted connection.
async fn run_accept_loop(
    listener: TcpListener,
    registry: SharedRegistry,
    config: &ServerConfig,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    let broadcaster = Broadcaster::stream(registry.clone());
    let mut next_id: ClientId = 1;

    loop {
        if shutdown.is_stopping() {
            tracing::info!("stopping accept loop");
            // Listener drops here; in-flight sessions terminate on their
            // own poll ticks
            return Ok(());
        }

        match timeout(config.poll_interval, listener.accept()).await {
            Err(_elapsed) => {},
            Ok(Ok((stream, peer))) => {
                let id = next_id;
                next_id += 1;
                tracing::debug!(id, %peer, "accepted connection");

                let ctx = SessionContext {
                    registry: registry.clone(),
                    broadcaster: broadcaster.clone(),
                    shutdown: shutdown.clone(),
                    poll_interval: config.poll_interval,
                    max_line_len: config.max_line_len,
                };
                tokio::spawn(session::run_session(ctx, id, stream, peer));
            },
            Ok(Err(e)) => tracing::warn!("accept failed: {e}"),
        }
    }
}
