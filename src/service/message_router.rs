//! Message router: rate check, persist, then fan out to live connections.
//!
//! Every post follows the same sequence: acquire the author's lock → rate
//! check → persist (timestamp assigned by the store) → snapshot recipients
//! from the registry → queue the frame on each recipient's transport.
//!
//! The per-author lock keeps one author's posts persisted and broadcast in
//! the order they were submitted, even when they arrive over several
//! connections or the REST endpoint. Posts by different authors proceed
//! concurrently and have no relative ordering.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::RateLimiter;
use crate::domain::{ConnectionRegistry, MessageTarget, PostedMessage, Session};
use crate::error::GatewayError;
use crate::persistence::{MessageStore, NewMessage};

/// Outcome of a successful post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Server-assigned timestamp.
    pub timestamp: DateTime<Utc>,
    /// Live connections selected as recipients.
    pub recipients: usize,
    /// Recipients whose queue accepted the frame.
    pub delivered: usize,
}

/// Routes posted messages to the right live connections.
#[derive(Debug)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn MessageStore>,
    rate_limiter: RateLimiter,
    max_content_len: usize,
    author_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MessageRouter {
    /// Creates a router over the shared registry and store.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn MessageStore>,
        rate_limiter: RateLimiter,
        max_content_len: usize,
    ) -> Self {
        Self {
            registry,
            store,
            rate_limiter,
            max_content_len,
            author_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a reference to the registry this router reads.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Posts `content` from `author` to `target` and delivers it.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for empty or oversized content.
    /// - [`GatewayError::RateLimited`] if the author is posting too fast.
    /// - [`GatewayError::PersistenceError`] if the store failed; nothing is
    ///   delivered in that case.
    pub async fn route_and_deliver(
        &self,
        author: &Session,
        target: MessageTarget,
        content: String,
    ) -> Result<DeliveryReport, GatewayError> {
        self.validate(&target, &content)?;

        let author_lock = self.author_lock(&author.username).await;
        let guard = author_lock.lock().await;

        let result = self.persist_and_broadcast(author, target, content).await;

        drop(guard);
        self.release_author_lock(&author.username, author_lock).await;
        result
    }

    fn validate(&self, target: &MessageTarget, content: &str) -> Result<(), GatewayError> {
        if target.name().trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "no message destination given".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "message content is empty".to_string(),
            ));
        }
        if content.chars().count() > self.max_content_len {
            return Err(GatewayError::InvalidRequest(format!(
                "message content exceeds {} characters",
                self.max_content_len
            )));
        }
        Ok(())
    }

    async fn persist_and_broadcast(
        &self,
        author: &Session,
        target: MessageTarget,
        content: String,
    ) -> Result<DeliveryReport, GatewayError> {
        self.rate_limiter.check(&author.username).await?;

        let new_message = NewMessage {
            author_username: author.username.clone(),
            session_id: author.session_id,
            target,
            content,
        };
        let timestamp = self.store.insert_message(&new_message).await?;

        let posted = PostedMessage {
            author_username: new_message.author_username,
            target: new_message.target,
            content: new_message.content,
            timestamp,
        };
        let json = serde_json::to_string(&posted.to_frame())
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let frame = Utf8Bytes::from(json);

        let recipients = self
            .registry
            .recipients(&posted.target, &posted.author_username, Utc::now())
            .await;

        let mut delivered = 0usize;
        for recipient in &recipients {
            match recipient.transport.deliver(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %recipient.connection_id,
                        username = %recipient.username,
                        error = %e,
                        "dropping frame for unresponsive connection"
                    );
                }
            }
        }

        tracing::debug!(
            author = %posted.author_username,
            target = posted.target.kind_str(),
            name = posted.target.name(),
            recipients = recipients.len(),
            delivered,
            "message routed"
        );

        Ok(DeliveryReport {
            timestamp,
            recipients: recipients.len(),
            delivered,
        })
    }

    async fn author_lock(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.author_locks.lock().await;
        Arc::clone(
            locks
                .entry(username.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drops the author's lock from the map once nobody else holds or waits
    /// on it.
    async fn release_author_lock(&self, username: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.author_locks.lock().await;
        // Map entry + `lock` are the only references when idle.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(username);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ConnectionInbox;
    use crate::domain::connection_registry::tests::{make_entry, make_session};
    use crate::persistence::InMemoryMessageStore;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        store: Arc<InMemoryMessageStore>,
        router: MessageRouter,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::default());
        let store = Arc::new(InMemoryMessageStore::new());
        let limiter = RateLimiter::new(
            Arc::clone(&store) as Arc<dyn MessageStore>,
            4,
            chrono::Duration::seconds(10),
        );
        let router = MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn MessageStore>,
            limiter,
            2000,
        );
        Fixture {
            registry,
            store,
            router,
        }
    }

    fn next_frame(inbox: &mut ConnectionInbox) -> Option<serde_json::Value> {
        let frame = inbox.outbound.try_recv().ok()?;
        serde_json::from_str(frame.as_str()).ok()
    }

    #[tokio::test]
    async fn channel_post_reaches_subscribers_including_author() {
        let fx = fixture();
        let alice = make_session("alice");
        let bob = make_session("bob");
        let carol = make_session("carol");
        let (a, mut inbox_a) = make_entry(&alice, &["home"]);
        let (b, mut inbox_b) = make_entry(&bob, &["home"]);
        let (c, mut inbox_c) = make_entry(&carol, &["away"]);
        fx.registry.register(a).await;
        fx.registry.register(b).await;
        fx.registry.register(c).await;

        let Ok(report) = fx
            .router
            .route_and_deliver(&alice, MessageTarget::Channel("home".into()), "hi".into())
            .await
        else {
            panic!("post should succeed");
        };
        assert_eq!(report.recipients, 2);
        assert_eq!(report.delivered, 2);

        let Some(frame) = next_frame(&mut inbox_b) else {
            panic!("bob should receive the message");
        };
        assert_eq!(frame["type"], "channel_message");
        assert_eq!(frame["channel_name"], "home");
        assert_eq!(frame["author_username"], "alice");
        assert_eq!(frame["content"], "hi");
        assert!(next_frame(&mut inbox_a).is_some());
        assert!(next_frame(&mut inbox_c).is_none());
    }

    #[tokio::test]
    async fn private_post_reaches_both_parties_only() {
        let fx = fixture();
        let alice = make_session("alice");
        let bob = make_session("bob");
        let carol = make_session("carol");
        let (a, mut inbox_a) = make_entry(&alice, &["home"]);
        let (b, mut inbox_b) = make_entry(&bob, &[]);
        let (c, mut inbox_c) = make_entry(&carol, &["home"]);
        fx.registry.register(a).await;
        fx.registry.register(b).await;
        fx.registry.register(c).await;

        let result = fx
            .router
            .route_and_deliver(&alice, MessageTarget::User("bob".into()), "psst".into())
            .await;
        assert!(result.is_ok());

        let Some(to_bob) = next_frame(&mut inbox_b) else {
            panic!("bob should receive the private message");
        };
        assert_eq!(to_bob["type"], "private_message");
        assert_eq!(to_bob["recipient_username"], "bob");
        assert!(next_frame(&mut inbox_a).is_some());
        assert!(next_frame(&mut inbox_c).is_none());
    }

    #[tokio::test]
    async fn persisted_before_broadcast() {
        let fx = fixture();
        let alice = make_session("alice");
        let Ok(report) = fx
            .router
            .route_and_deliver(&alice, MessageTarget::Channel("empty".into()), "x".into())
            .await
        else {
            panic!("post should succeed");
        };
        assert_eq!(report.recipients, 0);
        assert_eq!(fx.store.len().await, 1);
    }

    #[tokio::test]
    async fn fifth_rapid_post_is_rejected_and_not_stored() {
        let fx = fixture();
        let alice = make_session("alice");
        for i in 0..4 {
            let sent = fx
                .router
                .route_and_deliver(&alice, MessageTarget::Channel("home".into()), format!("{i}"))
                .await;
            assert!(sent.is_ok());
        }
        let fifth = fx
            .router
            .route_and_deliver(&alice, MessageTarget::Channel("home".into()), "5".into())
            .await;
        assert!(matches!(fifth, Err(GatewayError::RateLimited { .. })));
        assert_eq!(fx.store.len().await, 4);
    }

    #[tokio::test]
    async fn invalid_content_rejected_before_storage() {
        let fx = fixture();
        let alice = make_session("alice");
        let empty = fx
            .router
            .route_and_deliver(&alice, MessageTarget::Channel("home".into()), "   ".into())
            .await;
        assert!(matches!(empty, Err(GatewayError::InvalidRequest(_))));
        let huge = fx
            .router
            .route_and_deliver(&alice, MessageTarget::Channel("home".into()), "x".repeat(2001))
            .await;
        assert!(matches!(huge, Err(GatewayError::InvalidRequest(_))));
        assert!(fx.store.is_empty().await);
    }

    #[tokio::test]
    async fn full_queue_counts_as_undelivered() {
        let fx = fixture();
        let alice = make_session("alice");
        let bob = make_session("bob");
        let (handle, _inbox) = crate::domain::ConnectionHandle::channel(1);
        let mut b = make_entry(&bob, &["home"]).0;
        b.transport = handle.clone();
        fx.registry.register(b).await;
        assert!(handle.deliver(Utf8Bytes::from("filler")).is_ok());

        let Ok(report) = fx
            .router
            .route_and_deliver(&alice, MessageTarget::Channel("home".into()), "hi".into())
            .await
        else {
            panic!("post should succeed even if delivery fails");
        };
        assert_eq!(report.recipients, 1);
        assert_eq!(report.delivered, 0);
        // Not removed on delivery failure; the liveness sweep handles it.
        assert_eq!(fx.registry.len().await, 1);
    }

    #[tokio::test]
    async fn author_locks_are_released() {
        let fx = fixture();
        let alice = make_session("alice");
        let _ = fx
            .router
            .route_and_deliver(&alice, MessageTarget::Channel("home".into()), "hi".into())
            .await;
        assert!(fx.router.author_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn one_author_is_delivered_in_submission_order() {
        let fx = fixture();
        let alice = make_session("alice");
        let bob = make_session("bob");
        let (b, mut inbox_b) = make_entry(&bob, &["home"]);
        fx.registry.register(b).await;

        for i in 0..3 {
            let sent = fx
                .router
                .route_and_deliver(&alice, MessageTarget::Channel("home".into()), format!("m{i}"))
                .await;
            assert!(sent.is_ok());
        }
        let mut seen = Vec::new();
        while let Some(frame) = next_frame(&mut inbox_b) {
            seen.push(frame["content"].as_str().unwrap_or_default().to_string());
        }
        assert_eq!(seen, vec!["m0", "m1", "m2"]);
    }
}
