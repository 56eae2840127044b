//! Authoritative set of live connections.
//!
//! [`ConnectionRegistry`] keeps every authenticated connection in one
//! `HashMap` behind a single [`tokio::sync::RwLock`]. Every mutation takes
//! the write lock for its whole duration, so readers (the router and the
//! liveness monitor) never observe a half-updated entry.
//!
//! Nothing here performs socket I/O while holding the lock: recipient
//! lookups return cloned transport handles, and evicted entries are handed
//! back to the caller to be closed after the lock is released.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::connection_entry::{ConnectionEntry, ConnectionSummary};
use super::{ConnectionHandle, ConnectionId, MessageTarget, SessionId, SubscriptionSet};

/// A recipient snapshot taken under the read lock.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Connection the frame is for.
    pub connection_id: ConnectionId,
    /// Username bound to the connection.
    pub username: String,
    /// Where to send it.
    pub transport: ConnectionHandle,
}

/// In-memory registry of live connections.
///
/// # Concurrency
///
/// - Lookups and recipient scans share the read lock.
/// - Register, touch, subscription updates, removal and eviction are
///   serialized on the write lock.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    staleness: chrono::Duration,
}

impl ConnectionRegistry {
    /// Creates an empty registry that treats entries silent for longer than
    /// `staleness` as dead.
    #[must_use]
    pub fn new(staleness: chrono::Duration) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            staleness,
        }
    }

    /// The staleness threshold this registry was created with.
    #[must_use]
    pub const fn staleness(&self) -> chrono::Duration {
        self.staleness
    }

    /// Inserts a freshly authenticated connection.
    ///
    /// Returns `false` and leaves the registry untouched when the connection
    /// identifier is already registered.
    pub async fn register(&self, entry: ConnectionEntry) -> bool {
        let mut map = self.connections.write().await;
        if map.contains_key(&entry.connection_id) {
            tracing::debug!(connection_id = %entry.connection_id, "duplicate connect ignored");
            return false;
        }
        tracing::info!(
            connection_id = %entry.connection_id,
            username = %entry.username,
            subscriptions = entry.subscriptions.len(),
            "connection registered"
        );
        map.insert(entry.connection_id, entry);
        true
    }

    /// Returns a copy of the entry for `connection_id`.
    pub async fn get(&self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        self.connections.read().await.get(&connection_id).cloned()
    }

    /// Returns the first live connection bound to `session_id`.
    pub async fn find_by_session(&self, session_id: SessionId) -> Option<ConnectionEntry> {
        let map = self.connections.read().await;
        map.values().find(|e| e.session_id == session_id).cloned()
    }

    /// Returns every connection bound to `session_id`.
    pub async fn connections_for_session(&self, session_id: SessionId) -> Vec<ConnectionEntry> {
        let map = self.connections.read().await;
        map.values()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Replaces the subscription set of a connection wholesale.
    ///
    /// Returns `false` if the connection is not registered.
    pub async fn update_subscriptions(
        &self,
        connection_id: ConnectionId,
        subscriptions: SubscriptionSet,
    ) -> bool {
        let mut map = self.connections.write().await;
        let Some(entry) = map.get_mut(&connection_id) else {
            return false;
        };
        entry.subscriptions = subscriptions;
        true
    }

    /// Refreshes `last_acknowledged` to now.
    pub async fn touch(&self, connection_id: ConnectionId) -> bool {
        self.touch_at(connection_id, Utc::now()).await
    }

    /// Refreshes `last_acknowledged` to `now`.
    ///
    /// Returns `false` if the connection is not registered.
    pub async fn touch_at(&self, connection_id: ConnectionId, now: DateTime<Utc>) -> bool {
        let mut map = self.connections.write().await;
        let Some(entry) = map.get_mut(&connection_id) else {
            return false;
        };
        if now > entry.last_acknowledged {
            entry.last_acknowledged = now;
        }
        true
    }

    /// Removes a connection, returning its entry if it was registered.
    pub async fn remove(&self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        let removed = self.connections.write().await.remove(&connection_id);
        if let Some(entry) = &removed {
            tracing::info!(
                connection_id = %connection_id,
                username = %entry.username,
                "connection removed"
            );
        }
        removed
    }

    /// Snapshots the live transports that should receive a message for
    /// `target` written by `author`.
    ///
    /// - Channel target: every connection subscribed to the channel.
    /// - Private target: every connection of the recipient or the author.
    ///
    /// Entries that are already stale at `now` are skipped.
    pub async fn recipients(
        &self,
        target: &MessageTarget,
        author: &str,
        now: DateTime<Utc>,
    ) -> Vec<Recipient> {
        let map = self.connections.read().await;
        map.values()
            .filter(|e| !e.is_stale(now, self.staleness))
            .filter(|e| match target {
                MessageTarget::Channel(channel) => e.subscriptions.matches(channel),
                MessageTarget::User(recipient) => e.username == *recipient || e.username == author,
            })
            .map(|e| Recipient {
                connection_id: e.connection_id,
                username: e.username.clone(),
                transport: e.transport.clone(),
            })
            .collect()
    }

    /// Removes every entry whose last traffic is older than the staleness
    /// threshold at `now`, returning the removed entries.
    ///
    /// The caller closes the returned transports.
    pub async fn evict_stale(&self, now: DateTime<Utc>) -> Vec<ConnectionEntry> {
        let mut map = self.connections.write().await;
        let stale: Vec<ConnectionId> = map
            .values()
            .filter(|e| e.is_stale(now, self.staleness))
            .map(|e| e.connection_id)
            .collect();
        stale.iter().filter_map(|id| map.remove(id)).collect()
    }

    /// Empties the registry and closes every transport. Used at shutdown.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<ConnectionEntry> = {
            let mut map = self.connections.write().await;
            map.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            entry.transport.close();
        }
        drained.len()
    }

    /// Returns summaries of all live connections.
    pub async fn summaries(&self) -> Vec<ConnectionSummary> {
        let map = self.connections.read().await;
        map.values().map(ConnectionSummary::from).collect()
    }

    /// Returns the number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(chrono::Duration::minutes(4))
    }
}
