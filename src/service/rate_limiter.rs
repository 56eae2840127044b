//! Per-author posting rate limit derived from message history.
//!
//! Nothing is counted in memory: the decision is recomputed on every post
//! from the `limit` most recent timestamps in the [`MessageStore`]. If the
//! author already has `limit` messages and the oldest of them is younger
//! than the window, the post is refused.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::persistence::MessageStore;

/// History-backed rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn MessageStore>,
    limit: u32,
    window: chrono::Duration,
}

impl RateLimiter {
    /// Allows at most `limit` messages per author inside any trailing
    /// `window`.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, limit: u32, window: chrono::Duration) -> Self {
        Self {
            store,
            limit: limit.max(1),
            window,
        }
    }

    /// Returns `true` if `username` may post now. Storage failures count as
    /// "no".
    pub async fn may_post(&self, username: &str) -> bool {
        self.check_at(username, Utc::now()).await.is_ok()
    }

    /// Checks whether `username` may post now.
    ///
    /// # Errors
    ///
    /// See [`RateLimiter::check_at`].
    pub async fn check(&self, username: &str) -> Result<(), GatewayError> {
        self.check_at(username, Utc::now()).await
    }

    /// Checks whether `username` may post at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] with the time until the oldest
    /// counted message leaves the window, or the store's error if history
    /// could not be read.
    pub async fn check_at(&self, username: &str, now: DateTime<Utc>) -> Result<(), GatewayError> {
        let recent = self
            .store
            .recent_message_timestamps(username, self.limit)
            .await?;

        if recent.len() < self.limit as usize {
            return Ok(());
        }
        let Some(oldest) = recent.iter().min() else {
            return Ok(());
        };

        let age = now.signed_duration_since(*oldest);
        if age >= self.window {
            return Ok(());
        }

        let retry_after_ms = u64::try_from((self.window - age).num_milliseconds()).unwrap_or(0);
        tracing::debug!(username, retry_after_ms, "post rate limited");
        Err(GatewayError::RateLimited { retry_after_ms })
    }
}
