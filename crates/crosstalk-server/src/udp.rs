//! Datagram relay loop.
//!
//! UDP has no standing connection to dedicate a session task to, so a
//! single receive loop performs the registration/active dispatch itself,
//! keyed by source address. Each datagram is one complete message; there
//! is no reassembly and no handle to close on departure.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use crosstalk_proto::{ClientMessage, notice, parse_registration};
use tokio::{net::UdpSocket, time::timeout};

use crate::{
    broadcast::Broadcaster,
    error::ServerError,
    registry::{ClientId, ClientRecord, SharedRegistry},
    shutdown::ShutdownSignal,
};

/// Largest accepted datagram. Anything the transport can carry.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Single-loop relay over a shared datagram socket.
pub(crate) struct UdpRelay {
    socket: Arc<UdpSocket>,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
    shutdown: ShutdownSignal,
    poll_interval: Duration,
    /// Source address -> connection identity. An address maps to at most
    /// one registered member.
    addrs: HashMap<SocketAddr, ClientId>,
    next_id: ClientId,
}

impl UdpRelay {
    pub(crate) fn new(
        socket: Arc<UdpSocket>,
        registry: SharedRegistry,
        shutdown: ShutdownSignal,
        poll_interval: Duration,
    ) -> Self {
        let broadcaster = Broadcaster::datagram(registry.clone(), Arc::clone(&socket));
        Self {
            socket,
            registry,
            broadcaster,
            shutdown,
            poll_interval,
            addrs: HashMap::new(),
            next_id: 1,
        }
    }

    /// Receive datagrams until shutdown, checking the signal once per
    /// poll interval.
    pub(crate) async fn run(mut self) -> Result<(), ServerError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            if self.shutdown.is_stopping() {
                tracing::info!("stopping datagram loop");
                return Ok(());
            }

            let (len, addr) = match timeout(self.poll_interval, self.socket.recv_from(&mut buf))
                .await
            {
                Err(_elapsed) => continue,
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    tracing::warn!("recv failed: {e}");
                    continue;
                },
            };

            let text = String::from_utf8_lossy(&buf[..len]);
            let line = text.trim_end_matches(['\n', '\r']).to_string();
            self.handle_datagram(addr, &line).await;
        }
    }

    async fn handle_datagram(&mut self, addr: SocketAddr, line: &str) {
        let registered = self
            .addrs
            .get(&addr)
            .copied()
            .and_then(|id| self.registry.lock().name_of(id).map(|name| (id, name)));

        match registered {
            Some((id, name)) => self.dispatch_active(addr, id, &name, line).await,
            None => {
                // Unknown address, or evicted after a failed send; either
                // way the peer must (re-)register.
                self.addrs.remove(&addr);
                self.register(addr, line).await;
            },
        }
    }

    async fn register(&mut self, addr: SocketAddr, line: &str) {
        let name = match parse_registration(line) {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!(%addr, "rejecting registration: {e}");
                self.broadcaster.send_to_addr(addr, notice::USAGE_HINT).await;
                return;
            },
        };

        let id = self.next_id;
        self.next_id += 1;

        if let Err(e) = self.registry.lock().register(id, ClientRecord::datagram(&name, addr)) {
            tracing::error!(id, %addr, "registration rejected: {e}");
            return;
        }
        self.addrs.insert(addr, id);

        tracing::info!(id, name = %name, %addr, "registered");
        self.broadcaster.broadcast(&notice::joined(&name), Some(id)).await;
    }

    async fn dispatch_active(&mut self, addr: SocketAddr, id: ClientId, name: &str, line: &str) {
        match ClientMessage::parse(line) {
            ClientMessage::Quit => {
                self.addrs.remove(&addr);
                if self.registry.lock().remove(id).is_some() {
                    tracing::info!(id, name = %name, "clean quit");
                    self.broadcaster.broadcast(&notice::left(name), Some(id)).await;
                }
            },
            ClientMessage::Help => {
                self.broadcaster.send_to_addr(addr, notice::HELP_TEXT).await;
            },
            ClientMessage::Unknown(command) => {
                tracing::debug!(id, command, "unknown command");
                self.broadcaster.send_to_addr(addr, notice::UNKNOWN_COMMAND).await;
            },
            ClientMessage::Chat(text) => {
                self.broadcaster.broadcast(&notice::chat_line(name, &text), Some(id)).await;
            },
        }
    }
}
