//! A single live duplex channel, seen from the server side.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a frame could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Outbound buffer full (slow receiver). The frame was dropped.
    Full,
    /// Transport already gone.
    Closed,
}

/// Outbound half of a client connection.
///
/// Frames are queued with `try_send` so a slow receiver never blocks the
/// caller; the transport task drains the receiver and writes to the socket.
/// [`close`](Self::close) signals that task to shut the socket down.
#[derive(Debug)]
pub struct ClientConnection {
    /// Unique connection identifier.
    pub id: String,
    tx: mpsc::Sender<Arc<String>>,
    drops: AtomicU64,
    closed: CancellationToken,
    connected_at: DateTime<Utc>,
}

impl ClientConnection {
    /// Wrap an outbound sender.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            drops: AtomicU64::new(0),
            closed: CancellationToken::new(),
            connected_at: Utc::now(),
        }
    }

    /// Connection with a fresh time-ordered id and a buffer of `capacity` frames.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(uuid::Uuid::now_v7().to_string(), tx), rx)
    }

    /// Queue a serialized frame without waiting.
    pub fn send(&self, frame: Arc<String>) -> Result<(), SendFailure> {
        if self.closed.is_cancelled() {
            return Err(SendFailure::Closed);
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.drops.fetch_add(1, Ordering::Relaxed);
                Err(SendFailure::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendFailure::Closed),
        }
    }

    /// Lifetime count of frames dropped on a full buffer.
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Signal the transport to close. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled on close; transports select on it.
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// When the connection was accepted.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_queues_frame() {
        let (conn, mut rx) = ClientConnection::channel(4);
        conn.send(Arc::new("hello".into())).unwrap();
        assert_eq!(rx.recv().await.unwrap().as_str(), "hello");
    }

    #[test]
    fn full_buffer_counts_drop() {
        let (conn, _rx) = ClientConnection::channel(1);
        conn.send(Arc::new("a".into())).unwrap();
        assert_eq!(conn.send(Arc::new("b".into())), Err(SendFailure::Full));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (conn, rx) = ClientConnection::channel(1);
        drop(rx);
        assert_eq!(conn.send(Arc::new("a".into())), Err(SendFailure::Closed));
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let (conn, _rx) = ClientConnection::channel(1);
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert_eq!(conn.send(Arc::new("a".into())), Err(SendFailure::Closed));
    }

    #[test]
    fn ids_are_unique() {
        let (a, _ra) = ClientConnection::channel(1);
        let (b, _rb) = ClientConnection::channel(1);
        assert_ne!(a.id, b.id);
    }
}
