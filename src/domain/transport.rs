//! Transport handle for a live connection.
//!
//! [`ConnectionHandle`] is the registry's view of a socket: a bounded
//! [`tokio::sync::mpsc`] queue drained by the connection task, plus a close
//! signal. Sends never wait; a full or closed queue is a [`DeliveryError`]
//! and the frame is dropped.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{Notify, mpsc};

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection task has exited.
    #[error("connection closed")]
    Closed,
    /// The outbound queue is full; the peer is not reading.
    #[error("outbound queue full")]
    Full,
}

/// Cloneable sending half of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::Sender<Utf8Bytes>,
    close: Arc<Notify>,
}

/// Receiving half, owned by the connection task.
#[derive(Debug)]
pub struct ConnectionInbox {
    /// Frames queued for the socket.
    pub outbound: mpsc::Receiver<Utf8Bytes>,
    /// Fires when the server wants the socket closed.
    pub close: Arc<Notify>,
}

impl ConnectionHandle {
    /// Creates a handle/inbox pair with the given queue capacity.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, ConnectionInbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close = Arc::new(Notify::new());
        (
            Self {
                outbound: tx,
                close: Arc::clone(&close),
            },
            ConnectionInbox {
                outbound: rx,
                close,
            },
        )
    }

    /// Queues an already-serialized frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Full`] when the queue is at capacity and
    /// [`DeliveryError::Closed`] when the connection task is gone.
    pub fn deliver(&self, frame: Utf8Bytes) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Asks the connection task to close the socket.
    ///
    /// The signal is latched, so it is not lost if the task is busy.
    pub fn close(&self) {
        self.close.notify_one();
    }

    /// Returns `true` once the connection task dropped its inbox.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}
