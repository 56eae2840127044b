//! Client → server frames on the live connection.
//!
//! Server → client frames are [`crate::domain::OutboundFrame`].

use serde::Deserialize;

/// Why an inbound text frame was discarded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not JSON, or JSON of an unknown shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Frames a client may send, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Handshake; must be the first accepted frame.
    Connect {
        /// Session issued by login or register.
        session_id: String,
        /// Claimed username; must match the session when present.
        #[serde(default)]
        username: Option<String>,
        /// Initial channel subscriptions.
        #[serde(default)]
        subscriptions: Vec<String>,
    },

    /// Keep-alive.
    Heartbeat {
        /// Optional; must match the bound session.
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Replace the subscription set.
    Subscribe {
        /// Optional; must match the bound session.
        #[serde(default)]
        session_id: Option<String>,
        /// The complete new set. Missing means empty.
        #[serde(default)]
        subscriptions: Vec<String>,
    },

    /// Post a message to a channel or a user.
    PostMessage {
        /// Optional; must match the bound session.
        #[serde(default)]
        session_id: Option<String>,
        /// Text content.
        content: String,
        /// Target channel.
        #[serde(default)]
        to_channel: Option<String>,
        /// Target user, used when no channel is given.
        #[serde(default)]
        to_username: Option<String>,
    },
}

impl InboundFrame {
    /// Session id carried by the frame, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Connect { session_id, .. } => Some(session_id),
            Self::Heartbeat { session_id }
            | Self::Subscribe { session_id, .. }
            | Self::PostMessage { session_id, .. } => session_id.as_deref(),
        }
    }

    /// Frame name used in logs.
    #[must_use]
    pub const fn type_str(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Subscribe { .. } => "subscribe",
            Self::PostMessage { .. } => "post_message",
        }
    }
}

/// Decodes a text frame.
///
/// # Errors
///
/// Returns [`FrameError::Malformed`] if `text` is not a known frame.
pub fn parse_frame(text: &str) -> Result<InboundFrame, FrameError> {
    Ok(serde_json::from_str(text)?)
}
