//! Database models for messages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{MessageTarget, SessionId};

/// A message about to be stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Author username.
    pub author_username: String,
    /// Session the message was posted with.
    pub session_id: SessionId,
    /// Channel or recipient.
    pub target: MessageTarget,
    /// Text content.
    pub content: String,
}

/// A stored message row as returned by history queries.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredMessage {
    /// When the message was posted.
    pub timestamp: DateTime<Utc>,
    /// Author username.
    pub author_username: String,
    /// Text content.
    pub content: String,
}

/// Offset/limit window for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip.
    pub offset: u32,
    /// Maximum rows to return.
    pub limit: u32,
}

impl Page {
    /// Builds a page, clamping `limit` to `1..=max_limit`.
    #[must_use]
    pub fn new(offset: Option<u32>, limit: Option<u32>, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            offset: offset.unwrap_or(0),
            limit: limit.unwrap_or(max_limit).clamp(1, max_limit),
        }
    }
}
