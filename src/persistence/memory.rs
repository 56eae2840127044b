//! In-memory message store for tests and database-less deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::MessageStore;
use super::models::{NewMessage, Page, StoredMessage};
use crate::domain::MessageTarget;
use crate::error::GatewayError;

#[derive(Debug, Clone)]
struct Row {
    author_username: String,
    target: MessageTarget,
    content: String,
    created_at: DateTime<Utc>,
}

impl Row {
    fn to_stored(&self) -> StoredMessage {
        StoredMessage {
            timestamp: self.created_at,
            author_username: self.author_username.clone(),
            content: self.content.clone(),
        }
    }
}

/// Message store keeping every row in a `Vec`, append order.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    rows: RwLock<Vec<Row>>,
}

impl InMemoryMessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a message with an explicit timestamp.
    pub async fn insert_at(&self, message: &NewMessage, created_at: DateTime<Utc>) {
        self.rows.write().await.push(Row {
            author_username: message.author_username.clone(),
            target: message.target.clone(),
            content: message.content.clone(),
            created_at,
        });
    }

    /// Number of stored messages.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn page_newest_first(&self, page: Page, keep: impl Fn(&Row) -> bool) -> Vec<StoredMessage> {
        let rows = self.rows.read().await;
        let mut matching: Vec<&Row> = rows.iter().filter(|r| keep(r)).collect();
        // Stable sort keeps insertion order between equal timestamps; reverse
        // afterwards so the newest insert comes first.
        matching.sort_by_key(|r| r.created_at);
        matching
            .into_iter()
            .rev()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(Row::to_stored)
            .collect()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert_message(&self, message: &NewMessage) -> Result<DateTime<Utc>, GatewayError> {
        let mut rows = self.rows.write().await;
        let mut created_at = Utc::now();
        // Keep timestamps strictly increasing so history order is stable.
        if let Some(last) = rows.iter().map(|r| r.created_at).max()
            && created_at <= last
        {
            created_at = last + chrono::Duration::microseconds(1);
        }
        rows.push(Row {
            author_username: message.author_username.clone(),
            target: message.target.clone(),
            content: message.content.clone(),
            created_at,
        });
        Ok(created_at)
    }

    async fn recent_message_timestamps(
        &self,
        author: &str,
        limit: u32,
    ) -> Result<Vec<DateTime<Utc>>, GatewayError> {
        let rows = self.rows.read().await;
        let mut stamps: Vec<DateTime<Utc>> = rows
            .iter()
            .filter(|r| r.author_username == author)
            .map(|r| r.created_at)
            .collect();
        stamps.sort_unstable_by(|a, b| b.cmp(a));
        stamps.truncate(limit as usize);
        Ok(stamps)
    }

    async fn channel_history(
        &self,
        channel: &str,
        page: Page,
    ) -> Result<Vec<StoredMessage>, GatewayError> {
        Ok(self
            .page_newest_first(page, |r| {
                matches!(&r.target, MessageTarget::Channel(name) if name == channel)
            })
            .await)
    }

    async fn private_history(
        &self,
        user: &str,
        peer: &str,
        page: Page,
    ) -> Result<Vec<StoredMessage>, GatewayError> {
        Ok(self
            .page_newest_first(page, |r| match &r.target {
                MessageTarget::User(to) => {
                    (r.author_username == user && to == peer)
                        || (r.author_username == peer && to == user)
                }
                MessageTarget::Channel(_) => false,
            })
            .await)
    }
}
