//! Identity service: users, passwords and origin-scoped sessions.
//!
//! The real-time engine only ever calls [`IdentityService::validate_session`].
//! Registration, login and logout are used by the REST surface.

pub mod memory;
pub mod password;
pub mod postgres;

use std::net::IpAddr;

use async_trait::async_trait;

pub use memory::InMemoryIdentity;
pub use postgres::PostgresIdentity;

use crate::domain::{Session, SessionId};
use crate::error::GatewayError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Maximum accepted username length.
pub const MAX_USERNAME_LEN: usize = 32;

/// Issues and validates sessions.
#[async_trait]
pub trait IdentityService: Send + Sync + std::fmt::Debug {
    /// Returns the session if it exists, has not expired or been logged
    /// out, and was issued to `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionInvalid`] otherwise, or
    /// [`GatewayError::PersistenceError`] on storage failure.
    async fn validate_session(
        &self,
        session_id: SessionId,
        origin: IpAddr,
    ) -> Result<Session, GatewayError>;

    /// Creates a user and issues a first session for it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for malformed credentials and
    /// [`GatewayError::UsernameTaken`] if the name exists.
    async fn register(
        &self,
        username: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<Session, GatewayError>;

    /// Verifies a password and issues a new session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidCredentials`] on unknown user or
    /// wrong password.
    async fn login(
        &self,
        username: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<Session, GatewayError>;

    /// Expires a session. Unknown sessions are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn logout(&self, session_id: SessionId) -> Result<(), GatewayError>;
}

/// Checks username and password shape before anything is stored.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] describing the first problem.
pub fn validate_credentials(username: &str, password: &str) -> Result<(), GatewayError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(GatewayError::InvalidRequest(format!(
            "username must be 1 to {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(GatewayError::InvalidRequest(
            "username may only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(GatewayError::InvalidRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
