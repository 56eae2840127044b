//! In-memory identity service for tests and database-less deployments.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::password::{hash_password, verify_password};
use super::{IdentityService, validate_credentials};
use crate::domain::{Session, SessionId};
use crate::error::GatewayError;

#[derive(Debug, Clone)]
struct SessionRow {
    session: Session,
    expired: bool,
}

/// Identity service holding users and sessions in process memory.
#[derive(Debug)]
pub struct InMemoryIdentity {
    users: RwLock<HashMap<String, String>>,
    sessions: RwLock<HashMap<SessionId, SessionRow>>,
    session_ttl: chrono::Duration,
}

impl InMemoryIdentity {
    /// Creates an empty identity store issuing sessions valid for `session_ttl`.
    #[must_use]
    pub fn new(session_ttl: chrono::Duration) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
        }
    }

    /// Issues a session for `username` without a password check.
    ///
    /// Used to seed fixtures; the user need not be registered.
    pub async fn issue_session(&self, username: &str, origin: IpAddr) -> Session {
        let now = Utc::now();
        let session = Session {
            session_id: SessionId::new(),
            username: username.to_string(),
            origin,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.sessions.write().await.insert(
            session.session_id,
            SessionRow {
                session: session.clone(),
                expired: false,
            },
        );
        session
    }
}

impl Default for InMemoryIdentity {
    fn default() -> Self {
        Self::new(chrono::Duration::hours(168))
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentity {
    async fn validate_session(
        &self,
        session_id: SessionId,
        origin: IpAddr,
    ) -> Result<Session, GatewayError> {
        let sessions = self.sessions.read().await;
        match sessions.get(&session_id) {
            Some(row)
                if !row.expired
                    && row.session.origin == origin
                    && row.session.is_valid_at(Utc::now()) =>
            {
                Ok(row.session.clone())
            }
            _ => Err(GatewayError::SessionInvalid),
        }
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<Session, GatewayError> {
        validate_credentials(username, password)?;
        let hash = hash_password(password).await?;
        {
            let mut users = self.users.write().await;
            if users.contains_key(username) {
                return Err(GatewayError::UsernameTaken(username.to_string()));
            }
            users.insert(username.to_string(), hash);
        }
        tracing::info!(username, "user registered");
        Ok(self.issue_session(username, origin).await)
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<Session, GatewayError> {
        let stored = self.users.read().await.get(username).cloned();
        let Some(hash) = stored else {
            return Err(GatewayError::InvalidCredentials);
        };
        if !verify_password(password, &hash).await? {
            return Err(GatewayError::InvalidCredentials);
        }
        tracing::info!(username, "user logged in");
        Ok(self.issue_session(username, origin).await)
    }

    async fn logout(&self, session_id: SessionId) -> Result<(), GatewayError> {
        if let Some(row) = self.sessions.write().await.get_mut(&session_id) {
            row.expired = true;
        }
        Ok(())
    }
}
