//! PostgreSQL implementation of the identity service.

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use super::{IdentityService, validate_credentials};
use crate::domain::{Session, SessionId};
use crate::error::GatewayError;

/// PostgreSQL-backed users and sessions.
#[derive(Debug, Clone)]
pub struct PostgresIdentity {
    pool: PgPool,
    session_ttl: chrono::Duration,
}

impl PostgresIdentity {
    /// Creates a new identity service with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool, session_ttl: chrono::Duration) -> Self {
        Self { pool, session_ttl }
    }

    async fn create_session(&self, username: &str, origin: IpAddr) -> Result<Session, GatewayError> {
        let session_id = SessionId::new();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "INSERT INTO sessions (session_id, username, origin, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING created_at",
        )
        .bind(*session_id.as_uuid())
        .bind(username)
        .bind(origin.to_string())
        .bind(now)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(Session {
            session_id,
            username: username.to_string(),
            origin,
            created_at,
            expires_at,
        })
    }
}

#[async_trait]
impl IdentityService for PostgresIdentity {
    async fn validate_session(
        &self,
        session_id: SessionId,
        origin: IpAddr,
    ) -> Result<Session, GatewayError> {
        let row = sqlx::query_as::<_, (String, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT username, created_at, expires_at FROM sessions \
             WHERE session_id = $1 AND origin = $2 AND expired = FALSE AND expires_at > now()",
        )
        .bind(*session_id.as_uuid())
        .bind(origin.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        let Some((username, created_at, expires_at)) = row else {
            return Err(GatewayError::SessionInvalid);
        };
        Ok(Session {
            session_id,
            username,
            origin,
            created_at,
            expires_at,
        })
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<Session, GatewayError> {
        validate_credentials(username, password)?;
        let password_hash = hash_password(password).await?;

        let inserted = sqlx::query_scalar::<_, String>(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
             ON CONFLICT (username) DO NOTHING RETURNING username",
        )
        .bind(username)
        .bind(&password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        if inserted.is_none() {
            return Err(GatewayError::UsernameTaken(username.to_string()));
        }
        tracing::info!(username, "user registered");
        self.create_session(username, origin).await
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        origin: IpAddr,
    ) -> Result<Session, GatewayError> {
        let stored = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        let Some(hash) = stored else {
            return Err(GatewayError::InvalidCredentials);
        };
        if !verify_password(password, &hash).await? {
            return Err(GatewayError::InvalidCredentials);
        }
        tracing::info!(username, "user logged in");
        self.create_session(username, origin).await
    }

    async fn logout(&self, session_id: SessionId) -> Result<(), GatewayError> {
        let id: Uuid = *session_id.as_uuid();
        sqlx::query("UPDATE sessions SET expired = TRUE WHERE session_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(())
    }
}
