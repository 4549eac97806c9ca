//! Registry of currently open ingest connections.
//!
//! Each open connection owns a bounded outbound queue. The registry keeps
//! the sending half so that [`ConnectionRegistry::broadcast`] can reach every
//! member without touching the sockets directly; the connection task drains
//! its queue between inbound frames.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Default capacity of a connection's outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Sender handle for frames queued to one connection.
pub type OutboundSender = mpsc::Sender<String>;
/// Receiver handle drained by the connection task.
pub type OutboundReceiver = mpsc::Receiver<String>;

/// Opaque identity of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Shared membership set of open connections.
///
/// Cheap to clone; all clones see the same members.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    members: Arc<RwLock<HashMap<ConnectionId, OutboundSender>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound queue and return its id.
    pub async fn add(&self, sender: OutboundSender) -> ConnectionId {
        let id = ConnectionId::new();
        self.insert(id, sender).await;
        id
    }

    async fn insert(&self, id: ConnectionId, sender: OutboundSender) {
        self.members.write().await.insert(id, sender);
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        self.members.write().await.remove(&id).is_some()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Queue `message` to every registered connection.
    ///
    /// Works on a snapshot taken under the read lock, so connections that
    /// join or leave meanwhile do not disturb the iteration. A full or
    /// closed queue is skipped. Returns how many connections accepted the
    /// frame.
    pub async fn broadcast(&self, message: &str) -> usize {
        let snapshot: Vec<(ConnectionId, OutboundSender)> = self
            .members
            .read()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in snapshot {
            match sender.try_send(message.to_owned()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(connection = %id, error = %e, "Broadcast skipped connection");
                }
            }
        }
        delivered
    }

    /// Open a new connection: allocate its outbound queue and register it.
    pub async fn open(&self, buffer: usize) -> Connection {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut connection = Connection {
            id: ConnectionId::new(),
            state: ConnectionState::Connecting,
            outbound: rx,
            registry: self.clone(),
        };
        self.insert(connection.id, tx).await;
        connection.state = ConnectionState::Open;
        connection
    }
}

/// One registered connection, driven by its own task.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    outbound: OutboundReceiver,
    registry: ConnectionRegistry,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Wait for the next frame queued by a broadcast.
    ///
    /// Pends forever once closed, so it can sit in a `select!` next to the
    /// socket without firing spuriously.
    pub async fn next_outbound(&mut self) -> String {
        if self.state == ConnectionState::Open {
            if let Some(message) = self.outbound.recv().await {
                return message;
            }
        }
        std::future::pending().await
    }

    /// Transition to `Closed` and leave the registry. Safe to call twice.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.outbound.close();
        self.registry.remove(self.id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_and_close_lifecycle() {
        let registry = ConnectionRegistry::new();
        let mut connection = registry.open(DEFAULT_OUTBOUND_BUFFER).await;
        let id = connection.id();

        assert_eq!(connection.state(), ConnectionState::Open);
        assert!(registry.contains(id).await);

        connection.close().await;
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(!registry.contains(id).await);

        connection.close().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.add(tx).await;
        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member() {
        let registry = ConnectionRegistry::new();
        let mut a = registry.open(4).await;
        let mut b = registry.open(4).await;

        assert_eq!(registry.broadcast("hello").await, 2);
        assert_eq!(a.next_outbound().await, "hello");
        assert_eq!(b.next_outbound().await, "hello");
    }

    #[tokio::test]
    async fn test_broadcast_skips_dead_and_full_members() {
        let registry = ConnectionRegistry::new();

        let (dead_tx, dead_rx) = mpsc::channel(1);
        registry.add(dead_tx).await;
        drop(dead_rx);

        let mut full = registry.open(1).await;
        let mut healthy = registry.open(4).await;

        assert_eq!(registry.broadcast("first").await, 2);
        // `full` now holds one undrained frame.
        assert_eq!(registry.broadcast("second").await, 1);

        assert_eq!(full.next_outbound().await, "first");
        assert_eq!(healthy.next_outbound().await, "first");
        assert_eq!(healthy.next_outbound().await, "second");
    }

    #[tokio::test]
    async fn test_closed_connection_never_yields_outbound() {
        let registry = ConnectionRegistry::new();
        let mut connection = registry.open(4).await;
        connection.close().await;
        assert_eq!(registry.broadcast("late").await, 0);

        let waited = tokio::time::timeout(Duration::from_millis(20), connection.next_outbound()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_membership_changes() {
        let registry = ConnectionRegistry::new();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let mut connection = registry.open(2).await;
                registry.broadcast("ping").await;
                connection.close().await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.is_empty().await);
    }
}
