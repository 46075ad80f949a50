//! Connection handle and lifecycle
//!
//! A `Connection` is a cheap, cloneable handle to one live transport session.
//! Frames pushed to it land in a bounded FIFO queue drained by that
//! session's writer task through the paired `Outbox`.
//!
//! Lifecycle:
//!
//! ```text
//! Open ──► Closing ──► Closed
//! ```
//!
//! The lifecycle state and the outbound sender sit behind one mutex, so a push
//! either completes before a close begins or observes the close and fails.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::PushFrame;

/// Unique connection identifier, assigned by the listener
pub type ConnectionId = u64;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake complete, eligible for pushes
    Open,
    /// Removal from the registry in progress
    Closing,
    /// Terminal
    Closed,
}

/// Why a push to a single connection failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// Connection was closed (or is closing) in the registry
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    /// Registry still lists the connection but its writer is gone
    #[error("connection {0} transport is gone")]
    Disconnected(ConnectionId),
    /// Outbound queue is full
    #[error("connection {0} outbound queue is full")]
    QueueFull(ConnectionId),
}

impl PushError {
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            PushError::Closed(id) | PushError::Disconnected(id) | PushError::QueueFull(id) => *id,
        }
    }
}

struct Outbound {
    state: ConnectionState,
    tx: Option<mpsc::Sender<PushFrame>>,
}

struct Inner {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    opened_at: Instant,
    outbound: Mutex<Outbound>,
}

/// Handle to a live transport session
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Open a connection with an outbound queue of `capacity` frames
    ///
    /// Returns the handle and the receiving side for the writer task.
    pub fn open(
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
        capacity: usize,
    ) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let connection = Self {
            inner: Arc::new(Inner {
                id,
                peer_addr,
                opened_at: Instant::now(),
                outbound: Mutex::new(Outbound {
                    state: ConnectionState::Open,
                    tx: Some(tx),
                }),
            }),
        };

        (connection, Outbox { id, rx })
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Time since the handshake completed
    pub fn age(&self) -> Duration {
        self.inner.opened_at.elapsed()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.outbound.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Enqueue a frame without waiting
    pub fn push(&self, frame: PushFrame) -> Result<(), PushError> {
        let outbound = self.inner.outbound.lock();
        let id = self.inner.id;

        match (outbound.state, outbound.tx.as_ref()) {
            (ConnectionState::Open, Some(tx)) => tx.try_send(frame).map_err(|e| match e {
                TrySendError::Full(_) => PushError::QueueFull(id),
                TrySendError::Closed(_) => PushError::Disconnected(id),
            }),
            _ => Err(PushError::Closed(id)),
        }
    }

    /// `Open` → `Closing`. Returns false if the connection was not open.
    pub(crate) fn begin_close(&self) -> bool {
        let mut outbound = self.inner.outbound.lock();
        if outbound.state == ConnectionState::Open {
            outbound.state = ConnectionState::Closing;
            true
        } else {
            false
        }
    }

    /// Enter `Closed` and drop the outbound sender. Returns true only for the
    /// call that performed the transition.
    pub(crate) fn finish_close(&self) -> bool {
        let mut outbound = self.inner.outbound.lock();
        if outbound.state == ConnectionState::Closed {
            return false;
        }
        outbound.state = ConnectionState::Closed;
        outbound.tx = None;
        true
    }

    /// Close without going through a registry
    pub fn close(&self) -> bool {
        self.begin_close();
        self.finish_close()
    }

    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Receiving side of a connection's outbound queue
///
/// Yields frames in push order; returns `None` once the connection is closed
/// and the queue is drained.
#[derive(Debug)]
pub struct Outbox {
    id: ConnectionId,
    rx: mpsc::Receiver<PushFrame>,
}

impl Outbox {
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<PushFrame> {
        self.rx.recv().await
    }

    /// Take a frame if one is queued
    pub fn try_recv(&mut self) -> Option<PushFrame> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::message::{CircleId, Message, MessageId};

    fn frame(content: &str) -> PushFrame {
        PushFrame::for_message(&Message {
            id: MessageId::generate(),
            circle_id: CircleId::new("c1"),
            sender_id: "u1".into(),
            content: content.into(),
            created_at: Utc::now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_push_and_receive_in_order() {
        let (conn, mut outbox) = Connection::open(1, None, 8);

        conn.push(frame("a")).unwrap();
        conn.push(frame("b")).unwrap();

        let first = outbox.recv().await.unwrap();
        let second = outbox.recv().await.unwrap();
        assert!(std::str::from_utf8(first.payload()).unwrap().contains("\"a\""));
        assert!(std::str::from_utf8(second.payload()).unwrap().contains("\"b\""));
    }

    #[test]
    fn test_push_after_close_fails() {
        let (conn, mut outbox) = Connection::open(7, None, 8);

        assert!(conn.close());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.push(frame("late")), Err(PushError::Closed(7)));
        assert!(outbox.try_recv().is_none());
    }

    #[test]
    fn test_push_while_closing_fails() {
        let (conn, _outbox) = Connection::open(7, None, 8);

        assert!(conn.begin_close());
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(conn.push(frame("late")), Err(PushError::Closed(7)));
    }

    #[test]
    fn test_close_is_terminal_and_once() {
        let (conn, _outbox) = Connection::open(3, None, 8);

        assert!(conn.close());
        assert!(!conn.close());
        assert!(!conn.begin_close());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_queue_full() {
        let (conn, _outbox) = Connection::open(2, None, 1);

        conn.push(frame("a")).unwrap();
        assert_eq!(conn.push(frame("b")), Err(PushError::QueueFull(2)));
    }

    #[test]
    fn test_outbox_dropped_reports_disconnected() {
        let (conn, outbox) = Connection::open(5, None, 4);
        drop(outbox);

        assert!(conn.is_open());
        assert_eq!(conn.push(frame("a")), Err(PushError::Disconnected(5)));
    }

    #[tokio::test]
    async fn test_outbox_drains_then_ends_after_close() {
        let (conn, mut outbox) = Connection::open(9, None, 4);
        conn.push(frame("a")).unwrap();
        conn.close();

        assert!(outbox.recv().await.is_some());
        assert!(outbox.recv().await.is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let (conn, _outbox) = Connection::open(4, None, 4);
        let copy = conn.clone();

        conn.close();
        assert!(copy.same_as(&conn));
        assert_eq!(copy.state(), ConnectionState::Closed);
    }
}
