//! # murmur-gateway
//!
//! Real-time chat gateway: session-authenticated WebSocket connections,
//! channel subscriptions, persisted messages and live fan-out.
//!
//! Every live connection is tracked in one registry. A posted message is
//! rate checked, persisted, and then pushed to the connections that should
//! see it: channel subscribers for channel messages, both participants for
//! private ones. A periodic sweep evicts connections that stopped sending
//! heartbeats.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── Live Handler (ws/)
//!     │
//!     ├── SessionGate, RateLimiter, MessageRouter, LivenessMonitor (service/)
//!     │
//!     ├── ConnectionRegistry (domain/)
//!     │
//!     ├── IdentityService (identity/)
//!     └── MessageStore (persistence/)
//!            └── PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod origin;
pub mod persistence;
pub mod server;
pub mod service;
pub mod ws;
