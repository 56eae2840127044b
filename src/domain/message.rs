//! Posted message envelopes and the frames pushed to live connections.
//!
//! A [`PostedMessage`] is built once per post, handed to persistence and to
//! the router, and then dropped. Only its wire form, [`OutboundFrame`],
//! leaves the process.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a message is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageTarget {
    /// Public channel, delivered to its subscribers.
    Channel(String),
    /// One-to-one conversation with the named user.
    User(String),
}

impl MessageTarget {
    /// Builds a target from the optional channel / username pair carried by
    /// post requests. The channel wins when both are present; blank values
    /// count as absent.
    #[must_use]
    pub fn from_parts(channel: Option<&str>, username: Option<&str>) -> Option<Self> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }
        if let Some(channel) = present(channel) {
            return Some(Self::Channel(channel.to_string()));
        }
        present(username).map(|u| Self::User(u.to_string()))
    }

    /// Channel name or recipient username.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Channel(name) | Self::User(name) => name,
        }
    }

    /// Storage discriminator: `"channel"` or `"private"`.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Channel(_) => "channel",
            Self::User(_) => "private",
        }
    }
}

/// A message accepted for delivery.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    /// Author username.
    pub author_username: String,
    /// Channel or recipient.
    pub target: MessageTarget,
    /// Text content.
    pub content: String,
    /// Server-assigned timestamp from persistence.
    pub timestamp: DateTime<Utc>,
}

impl PostedMessage {
    /// Converts the envelope into the frame delivered to recipients.
    #[must_use]
    pub fn to_frame(&self) -> OutboundFrame {
        match &self.target {
            MessageTarget::Channel(channel_name) => OutboundFrame::ChannelMessage {
                channel_name: channel_name.clone(),
                author_username: self.author_username.clone(),
                content: self.content.clone(),
                timestamp: self.timestamp,
            },
            MessageTarget::User(recipient_username) => OutboundFrame::PrivateMessage {
                author_username: self.author_username.clone(),
                recipient_username: recipient_username.clone(),
                content: self.content.clone(),
                timestamp: self.timestamp,
            },
        }
    }
}

/// Server → client frame on the live connection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Sent once after a successful `connect` handshake.
    ConnectionSuccessful,

    /// A message posted to a channel the connection subscribes to.
    ChannelMessage {
        /// Channel the message was posted to.
        channel_name: String,
        /// Author username.
        author_username: String,
        /// Text content.
        content: String,
        /// Server-assigned timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A private message sent by or to the connection's user.
    PrivateMessage {
        /// Author username.
        author_username: String,
        /// Addressed user.
        recipient_username: String,
        /// Text content.
        content: String,
        /// Server-assigned timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A post from this connection was refused.
    Error {
        /// Numeric error code, same codes as the REST API.
        code: u32,
        /// Human-readable reason.
        message: String,
    },
}

impl OutboundFrame {
    /// Returns the frame type as a static string slice.
    #[must_use]
    pub const fn frame_type_str(&self) -> &'static str {
        match self {
            Self::ConnectionSuccessful => "connection_successful",
            Self::ChannelMessage { .. } => "channel_message",
            Self::PrivateMessage { .. } => "private_message",
            Self::Error { .. } => "error",
        }
    }
}
