//! Best-effort fan-out to every registered member.
//!
//! A broadcast takes a registry snapshot, then delivers outside the lock
//! so one blocked peer only ever delays its own traffic. Delivery is
//! at-most-once per live recipient: no retry, no buffering beyond the
//! writer channel. A failed delivery evicts that member and queues their
//! departure notice; the failure is logged, never propagated to the
//! sender.

use std::{collections::VecDeque, net::SocketAddr, sync::Arc};

use crosstalk_proto::notice;
use tokio::net::UdpSocket;

use crate::registry::{ClientId, Outbound, SharedRegistry};

/// Fan-out writer over the shared registry.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: SharedRegistry,
    /// Shared socket for datagram members. `None` on stream transports,
    /// where delivery goes through per-connection writer tasks.
    socket: Option<Arc<UdpSocket>>,
}

impl Broadcaster {
    /// Broadcaster for a stream-transport server.
    pub fn stream(registry: SharedRegistry) -> Self {
        Self { registry, socket: None }
    }

    /// Broadcaster for a datagram-transport server.
    pub fn datagram(registry: SharedRegistry, socket: Arc<UdpSocket>) -> Self {
        Self { registry, socket: Some(socket) }
    }

    /// Deliver `line` to every member except `exclude`.
    ///
    /// Members whose delivery fails are removed from the registry and
    /// their "left the chat" notice is broadcast in turn, so survivors
    /// hear about the departure exactly once.
    pub async fn broadcast(&self, line: &str, exclude: Option<ClientId>) {
        let mut pending: VecDeque<(String, Option<ClientId>)> = VecDeque::new();
        pending.push_back((line.to_string(), exclude));

        while let Some((line, exclude)) = pending.pop_front() {
            let snapshot = self.registry.lock().snapshot();

            for (id, record) in snapshot {
                if Some(id) == exclude {
                    continue;
                }
                if self.deliver(&record.outbound, &line).await {
                    continue;
                }

                // Eviction races with the session's own cleanup; whoever
                // removes the record owns the departure notice.
                if let Some(removed) = self.registry.lock().remove(id) {
                    tracing::warn!(id, name = %removed.name, "delivery failed, removing member");
                    pending.push_back((notice::left(&removed.name), Some(id)));
                }
            }
        }
    }

    /// Deliver one line directly to a datagram peer that may not be
    /// registered (usage hints, command replies).
    pub async fn send_to_addr(&self, addr: SocketAddr, line: &str) {
        if let Some(socket) = &self.socket {
            let mut data = line.as_bytes().to_vec();
            data.push(b'\n');
            if let Err(e) = socket.send_to(&data, addr).await {
                tracing::warn!(%addr, "datagram send failed: {e}");
            }
        }
    }

    async fn deliver(&self, outbound: &Outbound, line: &str) -> bool {
        match outbound {
            Outbound::Stream(tx) => tx.send(line.to_string()).is_ok(),
            Outbound::Datagram(addr) => {
                let Some(socket) = &self.socket else {
                    return false;
                };
                let mut data = line.as_bytes().to_vec();
                data.push(b'\n');
                socket.send_to(&data, *addr).await.is_ok()
            },
        }
    }
}
