//! Request/response DTOs for registration, login and logout.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Session;

/// Body of `POST /register` and `POST /login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    /// Username: letters, digits, `_`, `-` or `.`.
    pub username: String,
    /// Plain-text password, at least 6 characters.
    pub password: String,
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Session identifier to present on `connect` frames and REST calls.
    pub session_id: Uuid,
    /// Always `true`.
    pub success: bool,
    /// Username the session belongs to.
    pub username: String,
    /// End of the validity window.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_id: *session.session_id.as_uuid(),
            success: true,
            username: session.username.clone(),
            expires_at: session.expires_at,
        }
    }
}

/// Body of `POST /logout`. The session may come from the
/// `x-access-token` header instead.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Session to expire.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Result of a logout.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogoutResponse {
    /// Always `true`.
    pub success: bool,
    /// Live connections closed because they used the session.
    pub closed_connections: usize,
}
