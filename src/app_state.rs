//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::ConnectionRegistry;
use crate::identity::IdentityService;
use crate::persistence::MessageStore;
use crate::service::{MessageRouter, RateLimiter, SessionGate};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runtime configuration.
    pub config: Arc<GatewayConfig>,
    /// Users and sessions.
    pub identity: Arc<dyn IdentityService>,
    /// Session validation for handshakes and posts.
    pub session_gate: SessionGate,
    /// Live connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Message storage for history queries.
    pub store: Arc<dyn MessageStore>,
    /// Persist-and-deliver pipeline.
    pub router: Arc<MessageRouter>,
}

impl AppState {
    /// Wires the engine together from its collaborators.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.staleness_threshold()));
        let rate_limiter = RateLimiter::new(
            Arc::clone(&store),
            config.rate_limit_messages,
            config.rate_window(),
        );
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            rate_limiter,
            config.message_max_length,
        ));
        Self {
            config: Arc::new(config),
            session_gate: SessionGate::new(Arc::clone(&identity)),
            identity,
            registry,
            store,
            router,
        }
    }
}
