//! Session gate: authenticates connect handshakes and posts.

use std::net::IpAddr;
use std::sync::Arc;

use crate::domain::{Session, SessionId};
use crate::error::GatewayError;
use crate::identity::IdentityService;

/// Thin wrapper over [`IdentityService::validate_session`].
///
/// Accepts the raw session string from a frame so malformed identifiers
/// fail the same way as unknown ones.
#[derive(Debug, Clone)]
pub struct SessionGate {
    identity: Arc<dyn IdentityService>,
}

impl SessionGate {
    /// Creates a gate over the given identity service.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self { identity }
    }

    /// Validates `session_id` for a request coming from `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionInvalid`] if the identifier is
    /// malformed, unknown, expired, logged out or bound to another origin,
    /// and [`GatewayError::PersistenceError`] if the identity store failed.
    pub async fn authenticate(&self, session_id: &str, origin: IpAddr) -> Result<Session, GatewayError> {
        let Ok(id) = session_id.parse::<SessionId>() else {
            tracing::debug!(%origin, "malformed session id");
            return Err(GatewayError::SessionInvalid);
        };
        match self.identity.validate_session(id, origin).await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::debug!(session_id = %id, %origin, error = %e, "session rejected");
                Err(e)
            }
        }
    }

    /// Validates an already-parsed session id.
    ///
    /// # Errors
    ///
    /// Same as [`SessionGate::authenticate`].
    pub async fn revalidate(&self, session_id: SessionId, origin: IpAddr) -> Result<Session, GatewayError> {
        self.identity.validate_session(session_id, origin).await
    }
}
