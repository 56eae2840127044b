//! PostgreSQL implementation of the message store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::MessageStore;
use super::models::{NewMessage, Page, StoredMessage};
use crate::domain::MessageTarget;
use crate::error::GatewayError;

/// PostgreSQL-backed message store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Message timestamps come from the application clock, the same clock the
/// rate limiter measures its window with.
const INSERT_MESSAGE: &str = "INSERT INTO messages \
     (author_username, session_id, target_kind, channel_name, private_username, content, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING created_at";

fn rows_to_messages(rows: Vec<(DateTime<Utc>, String, String)>) -> Vec<StoredMessage> {
    rows.into_iter()
        .map(|(timestamp, author_username, content)| StoredMessage {
            timestamp,
            author_username,
            content,
        })
        .collect()
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn insert_message(&self, message: &NewMessage) -> Result<DateTime<Utc>, GatewayError> {
        let (channel_name, private_username) = match &message.target {
            MessageTarget::Channel(name) => (Some(name.as_str()), None),
            MessageTarget::User(name) => (None, Some(name.as_str())),
        };

        sqlx::query_scalar::<_, DateTime<Utc>>(INSERT_MESSAGE)
        .bind(&message.author_username)
        .bind(*message.session_id.as_uuid())
        .bind(message.target.kind_str())
        .bind(channel_name)
        .bind(private_username)
        .bind(&message.content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    async fn recent_message_timestamps(
        &self,
        author: &str,
        limit: u32,
    ) -> Result<Vec<DateTime<Utc>>, GatewayError> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM messages WHERE author_username = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(author)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    async fn channel_history(
        &self,
        channel: &str,
        page: Page,
    ) -> Result<Vec<StoredMessage>, GatewayError> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, String, String)>(
            "SELECT created_at, author_username, content FROM messages \
             WHERE target_kind = 'channel' AND channel_name = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(channel)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(rows_to_messages(rows))
    }

    async fn private_history(
        &self,
        user: &str,
        peer: &str,
        page: Page,
    ) -> Result<Vec<StoredMessage>, GatewayError> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, String, String)>(
            "SELECT created_at, author_username, content FROM messages \
             WHERE target_kind = 'private' AND ( \
                 (author_username = $1 AND private_username = $2) OR \
                 (author_username = $2 AND private_username = $1)) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(user)
        .bind(peer)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(rows_to_messages(rows))
    }
}
