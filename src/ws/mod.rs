//! WebSocket layer: the live connection endpoint.
//!
//! The endpoint at `/live` carries the handshake, heartbeats, subscription
//! changes and posts from the client, and pushes channel and private
//! messages back.

pub mod connection;
pub mod handler;
pub mod messages;

pub use connection::LiveConnection;
pub use messages::{FrameError, InboundFrame};
