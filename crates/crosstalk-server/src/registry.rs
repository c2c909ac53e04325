//! Connection registry for live chat members.
//!
//! The registry is the only shared mutable state in the server: a mapping
//! from connection identity to the member's record. It is a plain
//! synchronous structure; [`SharedRegistry`] wraps one instance in a
//! process-wide lock. Lock scope covers map mutation and snapshot copying
//! only - network writes always happen outside the lock, so a slow peer
//! can never stall membership changes.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;
use tokio::sync::mpsc;

/// Identity of one logical client connection.
///
/// Allocated from a monotonic counter for stream transports; derived from
/// the source address for datagram transports (one id per address).
pub type ClientId = u64;

/// Where a member's outbound traffic goes.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Stream transport: channel into the connection's writer task.
    ///
    /// A closed channel means the writer task is gone and the member is
    /// unreachable.
    Stream(mpsc::UnboundedSender<String>),
    /// Datagram transport: the source address to `send_to`.
    Datagram(SocketAddr),
}

/// Record for one registered member.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// Display name, set once at registration, immutable thereafter.
    pub name: String,
    /// Outbound delivery handle.
    pub outbound: Outbound,
}

impl ClientRecord {
    /// Create a record for a stream-transport member.
    pub fn stream(name: impl Into<String>, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { name: name.into(), outbound: Outbound::Stream(tx) }
    }

    /// Create a record for a datagram-transport member.
    pub fn datagram(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self { name: name.into(), outbound: Outbound::Datagram(addr) }
    }
}

/// Registration failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// The identity is already present.
    ///
    /// With counter-allocated ids this indicates a logic bug; for datagram
    /// transports it means the source address registered twice.
    #[error("client id {0} already registered")]
    DuplicateId(ClientId),
}

/// Mapping from connection identity to member record.
///
/// An id is present iff its session is between "registered" and "cleaned
/// up". All mutation goes through `&mut self`; concurrency is handled by
/// the lock in [`SharedRegistry`].
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientRecord>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new member.
    pub fn register(&mut self, id: ClientId, record: ClientRecord) -> Result<(), RegisterError> {
        if self.clients.contains_key(&id) {
            return Err(RegisterError::DuplicateId(id));
        }
        self.clients.insert(id, record);
        Ok(())
    }

    /// Remove a member. Idempotent; `None` if absent.
    pub fn remove(&mut self, id: ClientId) -> Option<ClientRecord> {
        self.clients.remove(&id)
    }

    /// Point-in-time copy of the membership for broadcast iteration.
    ///
    /// Taken under the registry lock, so no caller ever observes a
    /// half-updated entry. Iteration order is unspecified.
    pub fn snapshot(&self) -> Vec<(ClientId, ClientRecord)> {
        self.clients.iter().map(|(id, record)| (*id, record.clone())).collect()
    }

    /// Whether an id is currently registered.
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Display name for an id, if registered.
    pub fn name_of(&self, id: ClientId) -> Option<String> {
        self.clients.get(&id).map(|r| r.name.clone())
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Process-wide shared handle to the registry.
///
/// Uses a std mutex: every critical section is a short synchronous map
/// operation and the guard is never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry(Arc<Mutex<ClientRegistry>>);

impl SharedRegistry {
    /// Create a shared handle around an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the registry lock.
    #[allow(clippy::expect_used)]
    pub fn lock(&self) -> MutexGuard<'_, ClientRegistry> {
        self.0.lock().expect("registry mutex poisoned")
    }
}
