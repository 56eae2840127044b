//! Authenticated session record as returned by the identity service.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SessionId;

/// A validated session.
///
/// Owned by the identity service. The gateway only reads it and never
/// caches its validity beyond the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Session credential.
    pub session_id: SessionId,
    /// User the session was issued to.
    pub username: String,
    /// Address that logged in; requests from elsewhere are refused.
    pub origin: IpAddr,
    /// Start of the validity window.
    pub created_at: DateTime<Utc>,
    /// End of the validity window.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns `true` if `now` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now && now < self.expires_at
    }
}
