//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chorus_core::ids::ConnectionId;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Transport readiness of a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    /// Accepting outbound frames.
    Open = 0,
    /// Close started (client close frame, read side ended, heartbeat timeout).
    Closing = 1,
    /// Writer stopped.
    Closed = 2,
}

impl ReadyState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Why a frame was not queued for a client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is not open.
    #[error("connection is {0:?}")]
    NotOpen(ReadyState),
    /// The outbound queue is full.
    #[error("send queue full")]
    QueueFull,
    /// The writer task is gone.
    #[error("send channel closed")]
    ChannelClosed,
}

/// Represents a connected WebSocket client.
pub struct ClientConnection {
    id: ConnectionId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    state: AtomicU8,
    /// When this connection was established.
    pub connected_at: Instant,
    /// When we last heard anything from the client.
    last_seen: Mutex<Instant>,
    /// Count of frames not delivered to the writer.
    dropped_messages: AtomicU64,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    /// Create a new open connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            state: AtomicU8::new(ReadyState::Open as u8),
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Current readiness.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether frames may be sent.
    pub fn is_sendable(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Move `Open → Closing`. Returns `false` if already closing or closed.
    pub fn mark_closing(&self) -> bool {
        self.state
            .compare_exchange(
                ReadyState::Open as u8,
                ReadyState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closed` from any state.
    pub fn mark_closed(&self) {
        self.state.store(ReadyState::Closed as u8, Ordering::Release);
    }

    /// Queue a text frame for the client without waiting.
    ///
    /// Failures increment the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> Result<(), SendError> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(SendError::NotOpen(state));
        }
        let result = match self.tx.try_send(message) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(_)) => SendError::QueueFull,
            Err(TrySendError::Closed(_)) => SendError::ChannelClosed,
        };
        let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        Err(result)
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity (any frame, including Pong).
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the client was last heard from.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
