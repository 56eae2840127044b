//! WebSocket connection state machine.
//!
//! Each socket gets one task running [`run_connection`]. The task owns the
//! socket and multiplexes three sources with `tokio::select!`:
//!
//! - frames read from the client, dispatched through [`LiveConnection`];
//! - frames queued on the connection's [`ConnectionHandle`] by the router;
//! - the close signal raised by the liveness monitor, logout or shutdown.
//!
//! The connection enters the registry only after a `connect` frame
//! authenticates, and leaves it when the task exits.

use std::net::IpAddr;
use std::ops::ControlFlow;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use chrono::Utc;
use futures_util::{Sink, SinkExt, StreamExt};

use super::messages::{InboundFrame, parse_frame};
use crate::app_state::AppState;
use crate::domain::{
    ConnectionEntry, ConnectionHandle, ConnectionId, ConnectionInbox, MessageTarget,
    OutboundFrame, Session, SessionId, SubscriptionSet,
};
use crate::error::GatewayError;

/// Runs the read/write loop for a single WebSocket connection.
///
/// Every socket write is bounded by the configured write timeout; a peer
/// that stops reading is dropped instead of pinning the task.
pub async fn run_connection(socket: WebSocket, state: AppState, origin: IpAddr) {
    let write_timeout = state.config.write_timeout();
    let (mut conn, mut inbox) = LiveConnection::new(state, origin);
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            biased;

            () = inbox.close.notified() => {
                send_bounded(&mut ws_tx, Message::Close(None), write_timeout).await;
                break;
            }
            frame = inbox.outbound.recv() => {
                let Some(frame) = frame else { break };
                if !send_bounded(&mut ws_tx, Message::Text(frame), write_timeout).await {
                    tracing::debug!(connection_id = %conn.id(), "dropping connection after failed write");
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if conn.handle_text(text.as_str()).await.is_break() {
                            send_bounded(&mut ws_tx, Message::Close(None), write_timeout).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    conn.disconnect().await;
}

/// Writes one message, giving up after `limit`.
///
/// Returns `false` if the write failed or timed out.
async fn send_bounded<S>(ws_tx: &mut S, msg: Message, limit: Duration) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    match tokio::time::timeout(limit, ws_tx.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "socket write failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout = ?limit, "socket write timed out");
            false
        }
    }
}

/// Per-connection dispatcher, independent of the socket.
#[derive(Debug)]
pub struct LiveConnection {
    id: ConnectionId,
    handle: ConnectionHandle,
    origin: IpAddr,
    state: AppState,
    session: Option<Session>,
}

impl LiveConnection {
    /// Creates an unauthenticated connection and the inbox its socket task
    /// drains.
    #[must_use]
    pub fn new(state: AppState, origin: IpAddr) -> (Self, ConnectionInbox) {
        let (handle, inbox) = ConnectionHandle::channel(state.config.outbound_buffer);
        (
            Self {
                id: ConnectionId::new(),
                handle,
                origin,
                state,
                session: None,
            },
            inbox,
        )
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Session bound by the handshake, if it happened.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Dispatches one text frame. Malformed, unauthenticated and
    /// mismatched frames are dropped without a reply.
    ///
    /// Returns [`ControlFlow::Break`] once the connection has been removed
    /// from the registry behind its back (eviction, logout); the socket
    /// should then be closed.
    pub async fn handle_text(&mut self, text: &str) -> ControlFlow<()> {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(connection_id = %self.id, error = %e, "frame dropped");
                return ControlFlow::Continue(());
            }
        };

        let Some(session) = self.session.clone() else {
            if let InboundFrame::Connect {
                session_id,
                username,
                subscriptions,
            } = frame
            {
                self.connect(&session_id, username.as_deref(), subscriptions)
                    .await;
            } else {
                tracing::debug!(
                    connection_id = %self.id,
                    frame = frame.type_str(),
                    "frame before handshake dropped"
                );
            }
            return ControlFlow::Continue(());
        };

        if let Some(claimed) = frame.session_id()
            && claimed.parse::<SessionId>().ok() != Some(session.session_id)
        {
            tracing::debug!(
                connection_id = %self.id,
                frame = frame.type_str(),
                "session mismatch, frame dropped"
            );
            return ControlFlow::Continue(());
        }

        if let InboundFrame::Connect { .. } = frame {
            tracing::debug!(connection_id = %self.id, "repeated connect ignored");
            return ControlFlow::Continue(());
        }

        if !self.state.registry.touch(self.id).await {
            tracing::debug!(
                connection_id = %self.id,
                frame = frame.type_str(),
                "connection no longer registered, frame dropped"
            );
            self.session = None;
            return ControlFlow::Break(());
        }

        match frame {
            InboundFrame::Connect { .. } | InboundFrame::Heartbeat { .. } => {}
            InboundFrame::Subscribe { subscriptions, .. } => {
                let set: SubscriptionSet = subscriptions.iter().collect();
                tracing::debug!(
                    connection_id = %self.id,
                    channels = set.len(),
                    "subscriptions replaced"
                );
                self.state.registry.update_subscriptions(self.id, set).await;
            }
            InboundFrame::PostMessage {
                content,
                to_channel,
                to_username,
                ..
            } => {
                self.post(session, content, to_channel, to_username).await;
            }
        }
        ControlFlow::Continue(())
    }

    async fn connect(
        &mut self,
        session_id: &str,
        username: Option<&str>,
        subscriptions: Vec<String>,
    ) {
        let Ok(session) = self
            .state
            .session_gate
            .authenticate(session_id, self.origin)
            .await
        else {
            return;
        };
        if let Some(claimed) = username
            && claimed != session.username
        {
            tracing::debug!(
                connection_id = %self.id,
                username = %session.username,
                claimed,
                "username does not match session"
            );
            return;
        }

        let entry = ConnectionEntry::new(
            self.id,
            self.handle.clone(),
            &session,
            self.origin,
            subscriptions.iter().collect(),
            Utc::now(),
        );
        if self.state.registry.register(entry).await {
            self.session = Some(session);
            self.send(&OutboundFrame::ConnectionSuccessful);
        }
    }

    async fn post(
        &self,
        session: Session,
        content: String,
        to_channel: Option<String>,
        to_username: Option<String>,
    ) {
        let session = if self.state.config.session_revalidate {
            match self
                .state
                .session_gate
                .revalidate(session.session_id, self.origin)
                .await
            {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %self.id,
                        session_id = %session.session_id,
                        error = %e,
                        "post from invalidated session dropped"
                    );
                    return;
                }
            }
        } else {
            session
        };

        let Some(target) = MessageTarget::from_parts(to_channel.as_deref(), to_username.as_deref())
        else {
            self.reject(&GatewayError::InvalidRequest(
                "no message destination given".to_string(),
            ));
            return;
        };

        if let Err(e) = self
            .state
            .router
            .route_and_deliver(&session, target, content)
            .await
        {
            self.reject(&e);
        }
    }

    fn reject(&self, error: &GatewayError) {
        tracing::debug!(connection_id = %self.id, error = %error, "post rejected");
        self.send(&OutboundFrame::Error {
            code: error.error_code(),
            message: error.to_string(),
        });
    }

    fn send(&self, frame: &OutboundFrame) {
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize frame");
                return;
            }
        };
        if let Err(e) = self.handle.deliver(Utf8Bytes::from(json)) {
            tracing::warn!(
                connection_id = %self.id,
                frame = frame.frame_type_str(),
                error = %e,
                "frame not queued"
            );
        }
    }

    /// Removes the connection from the registry if it was registered.
    pub async fn disconnect(&mut self) {
        if self.session.take().is_some() {
            self.state.registry.remove(self.id).await;
        }
        tracing::debug!(connection_id = %self.id, "ws connection closed");
    }
}
