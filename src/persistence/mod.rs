//! Persistence layer: durable message storage and history queries.
//!
//! [`MessageStore`] is the seam the router and rate limiter consume. The
//! PostgreSQL implementation uses `sqlx::PgPool`; the in-memory one backs
//! tests and database-less deployments.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::InMemoryMessageStore;
pub use models::{NewMessage, Page, StoredMessage};
pub use postgres::PostgresMessageStore;

use crate::error::GatewayError;

/// Durable storage for posted messages.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Stores a message and returns the server-assigned timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn insert_message(&self, message: &NewMessage) -> Result<DateTime<Utc>, GatewayError>;

    /// Returns up to `limit` timestamps of messages written by `author`,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn recent_message_timestamps(
        &self,
        author: &str,
        limit: u32,
    ) -> Result<Vec<DateTime<Utc>>, GatewayError>;

    /// Returns a page of channel messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn channel_history(
        &self,
        channel: &str,
        page: Page,
    ) -> Result<Vec<StoredMessage>, GatewayError>;

    /// Returns a page of the private conversation between `user` and
    /// `peer` in both directions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn private_history(
        &self,
        user: &str,
        peer: &str,
        page: Page,
    ) -> Result<Vec<StoredMessage>, GatewayError>;
}
