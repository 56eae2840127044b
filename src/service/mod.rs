//! Service layer: the real-time engine's behaviour.
//!
//! [`SessionGate`] authenticates, [`RateLimiter`] throttles,
//! [`MessageRouter`] persists and fans out, and [`LivenessMonitor`] evicts
//! silent connections from the [`crate::domain::ConnectionRegistry`].

pub mod liveness;
pub mod message_router;
pub mod rate_limiter;
pub mod session_gate;

pub use liveness::LivenessMonitor;
pub use message_router::{DeliveryReport, MessageRouter};
pub use rate_limiter::RateLimiter;
pub use session_gate::SessionGate;
