//! Request/response DTOs for posting and reading messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::persistence::StoredMessage;
use crate::service::DeliveryReport;

/// Body of `POST /messages`.
///
/// Exactly one of `channel` or `username` should be set; `channel` wins
/// when both are.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PostMessageRequest {
    /// Session to post with. Falls back to the `x-access-token` header.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Text content.
    pub content: String,
    /// Target channel.
    #[serde(default)]
    pub channel: Option<String>,
    /// Target user for a private message.
    #[serde(default)]
    pub username: Option<String>,
}

/// Result of a successful post.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PostMessageResponse {
    /// Always `true`.
    pub success: bool,
    /// Server-assigned timestamp.
    pub timestamp: DateTime<Utc>,
    /// Live connections selected as recipients.
    pub recipients: usize,
    /// Recipients whose queue accepted the message.
    pub delivered: usize,
}

impl From<DeliveryReport> for PostMessageResponse {
    fn from(report: DeliveryReport) -> Self {
        Self {
            success: true,
            timestamp: report.timestamp,
            recipients: report.recipients,
            delivered: report.delivered,
        }
    }
}

/// A page of history, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Messages in the page.
    pub messages: Vec<StoredMessage>,
    /// Offset that was applied.
    pub offset: u32,
    /// Limit that was applied after clamping.
    pub limit: u32,
}
