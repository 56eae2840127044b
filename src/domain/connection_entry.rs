//! Registry entry for one live connection.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ConnectionHandle, ConnectionId, Session, SessionId, SubscriptionSet};

/// A live, authenticated connection.
///
/// `session_id`, `username` and `origin` are fixed at handshake; only the
/// subscription set and `last_acknowledged` change afterwards.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Unique per physical connection (immutable).
    pub connection_id: ConnectionId,

    /// Sending half of the socket.
    pub transport: ConnectionHandle,

    /// Session bound at handshake (immutable).
    pub session_id: SessionId,

    /// Username of the bound session (immutable).
    pub username: String,

    /// Address that performed the handshake (immutable).
    pub origin: IpAddr,

    /// Channels this connection receives.
    pub subscriptions: SubscriptionSet,

    /// Handshake time.
    pub connected_at: DateTime<Utc>,

    /// Last time any frame arrived on this connection.
    pub last_acknowledged: DateTime<Utc>,
}

impl ConnectionEntry {
    /// Creates an entry for a freshly authenticated connection.
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        transport: ConnectionHandle,
        session: &Session,
        origin: IpAddr,
        subscriptions: SubscriptionSet,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            connection_id,
            transport,
            session_id: session.session_id,
            username: session.username.clone(),
            origin,
            subscriptions,
            connected_at: now,
            last_acknowledged: now,
        }
    }

    /// Returns `true` if no traffic arrived for longer than `threshold`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_acknowledged) > threshold
    }
}

/// Lightweight view of a connection for diagnostics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionSummary {
    /// Connection identifier.
    #[schema(value_type = String, format = Uuid)]
    pub connection_id: ConnectionId,
    /// Bound username.
    pub username: String,
    /// Subscribed channel count.
    pub subscription_count: usize,
    /// Handshake time.
    pub connected_at: DateTime<Utc>,
    /// Last traffic.
    pub last_acknowledged: DateTime<Utc>,
}

impl From<&ConnectionEntry> for ConnectionSummary {
    fn from(entry: &ConnectionEntry) -> Self {
        Self {
            connection_id: entry.connection_id,
            username: entry.username.clone(),
            subscription_count: entry.subscriptions.len(),
            connected_at: entry.connected_at,
            last_acknowledged: entry.last_acknowledged,
        }
    }
}
