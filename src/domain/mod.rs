//! Domain layer: identities, sessions, connections and message envelopes.
//!
//! This module contains the server-side model of the real-time engine:
//! connection and session identity, the per-connection transport handle,
//! channel subscription sets, and the connection registry that the router
//! and liveness monitor operate on.

pub mod connection_entry;
pub mod connection_id;
pub mod connection_registry;
pub mod message;
pub mod session;
pub mod subscription;
pub mod transport;

pub use connection_entry::{ConnectionEntry, ConnectionSummary};
pub use connection_id::{ConnectionId, SessionId};
pub use connection_registry::{ConnectionRegistry, Recipient};
pub use message::{MessageTarget, OutboundFrame, PostedMessage};
pub use session::Session;
pub use subscription::SubscriptionSet;
pub use transport::{ConnectionHandle, ConnectionInbox, DeliveryError};
