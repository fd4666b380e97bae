//! Connection abstraction
//!
//! A `Connection` is the relay's handle to one transport socket. It owns no
//! business state: it can enqueue frames for the socket's writer task and ask
//! the socket to close. Handles are cheap to clone, so the registry can hold
//! back-references to member connections.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::protocol::RelayFrame;

/// Relay-assigned connection identity (not derived from the transport)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Failure to deliver a frame on one connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed locally or its writer task has exited
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The outbound queue is full; the peer is not keeping up
    #[error("send queue full on connection {0}")]
    QueueFull(ConnectionId),
}

struct Inner {
    id: ConnectionId,
    tx: mpsc::Sender<RelayFrame>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    frames_sent: AtomicU64,
    send_failures: AtomicU64,
}

/// Handle to one relay connection
///
/// Equality and hashing use the connection id only.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Create a connection backed by a bounded outbound queue
    ///
    /// Returns the handle and the receiving end, which the socket's writer
    /// task (or a test) drains.
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<RelayFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let inner = Inner {
            id,
            tx,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            frames_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Connection identity
    pub fn identity(&self) -> ConnectionId {
        self.inner.id
    }

    /// Enqueue a frame for delivery
    ///
    /// Never waits: a full queue or a closed connection is reported as an
    /// error and nothing is retried.
    pub fn send(&self, frame: RelayFrame) -> Result<(), TransportError> {
        if self.is_closed() {
            self.inner.send_failures.fetch_add(1, Ordering::Relaxed);
            return Err(TransportError::Closed(self.inner.id));
        }

        match self.inner.tx.try_send(frame) {
            Ok(()) => {
                self.inner.frames_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.inner.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::QueueFull(self.inner.id))
            }
            Err(TrySendError::Closed(_)) => {
                self.inner.closed.store(true, Ordering::Release);
                self.inner.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::Closed(self.inner.id))
            }
        }
    }

    /// Close the connection
    ///
    /// Idempotent. Later sends fail with [`TransportError::Closed`]; the
    /// socket tasks observe [`Connection::closed`] and shut the socket down.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(conn_id = %self.inner.id, "Connection close requested");
        }
        self.inner.shutdown.cancel();
    }

    /// Whether `close` has been called or the writer has gone away
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire) || self.inner.tx.is_closed()
    }

    /// Completes once `close` has been called
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await
    }

    /// Frames successfully enqueued
    pub fn frames_sent(&self) -> u64 {
        self.inner.frames_sent.load(Ordering::Relaxed)
    }

    /// Sends rejected because the connection was closed or backed up
    pub fn send_failures(&self) -> u64 {
        self.inner.send_failures.load(Ordering::Relaxed)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delivers_in_order() {
        let (conn, mut rx) = Connection::channel(ConnectionId(1), 8);

        conn.send(RelayFrame::text("one")).unwrap();
        conn.send(RelayFrame::binary(vec![2u8])).unwrap();

        assert_eq!(rx.recv().await.unwrap(), RelayFrame::text("one"));
        assert_eq!(rx.recv().await.unwrap(), RelayFrame::binary(vec![2u8]));
        assert_eq!(conn.frames_sent(), 2);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (conn, _rx) = Connection::channel(ConnectionId(2), 8);

        conn.close();
        assert!(conn.is_closed());

        let result = conn.send(RelayFrame::text("late"));
        assert_eq!(result, Err(TransportError::Closed(ConnectionId(2))));
        assert_eq!(conn.send_failures(), 1);

        // Closing twice is harmless
        conn.close();
        conn.closed().await;
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_fails() {
        let (conn, rx) = Connection::channel(ConnectionId(3), 8);
        drop(rx);

        let result = conn.send(RelayFrame::text("nobody"));
        assert_eq!(result, Err(TransportError::Closed(ConnectionId(3))));
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block() {
        let (conn, mut rx) = Connection::channel(ConnectionId(4), 1);

        conn.send(RelayFrame::text("first")).unwrap();
        let result = conn.send(RelayFrame::text("second"));
        assert_eq!(result, Err(TransportError::QueueFull(ConnectionId(4))));

        // Draining makes room again
        assert_eq!(rx.recv().await.unwrap(), RelayFrame::text("first"));
        conn.send(RelayFrame::text("third")).unwrap();
    }

    #[test]
    fn test_equality_by_id() {
        let (a, _rx_a) = Connection::channel(ConnectionId(5), 1);
        let (b, _rx_b) = Connection::channel(ConnectionId(6), 1);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.identity().to_string(), "conn-5");
    }
}
