//! Upstream session lifecycle.
//!
//! ```text
//! Uninitialized ──Open──▶ Open ──Message──▶ Open
//!       │                  │
//!       └──Error/Close──▶ Closed ◀──Error/Close──┘
//! ```
//!
//! `Closed` is terminal. A `Close` while already closed is accepted so the
//! common "error then close" sequence from the socket does not warn.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::types::ServerMessage;

/// Connection state of the upstream session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Connect issued, no `Open` seen yet.
    Uninitialized,
    /// Accepting traffic.
    Open,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Close details reported by the upstream (or synthesized locally).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code, when one was received.
    pub code: Option<u16>,
    /// Close reason text.
    pub reason: String,
}

impl CloseInfo {
    /// Close without a code, for transport failures and local shutdown.
    #[must_use]
    pub fn local(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }
}

/// An event emitted by the upstream session.
#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamEvent {
    /// Connection established and setup sent.
    Open,
    /// A decoded server message.
    Message(Box<ServerMessage>),
    /// Transport-level failure.
    Error(String),
    /// The connection ended.
    Close(CloseInfo),
}

impl UpstreamEvent {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Close(_) => "close",
        }
    }
}

/// An event that is not valid in the current state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The event cannot occur from `from`.
    #[error("illegal upstream transition: {event} while {from}")]
    IllegalTransition {
        /// State when the event arrived.
        from: SessionState,
        /// Event kind.
        event: &'static str,
    },
}

/// Tracks [`SessionState`] as events arrive.
#[derive(Debug)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLifecycle {
    /// Start in [`SessionState::Uninitialized`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply `event` and return the new state.
    ///
    /// Illegal events leave the state unchanged.
    pub fn advance(&mut self, event: &UpstreamEvent) -> Result<SessionState, LifecycleError> {
        use SessionState::{Closed, Open, Uninitialized};

        let next = match (self.state, event) {
            (Uninitialized, UpstreamEvent::Open)
            | (Open, UpstreamEvent::Message(_)) => Open,
            (Uninitialized | Open, UpstreamEvent::Error(_)) | (_, UpstreamEvent::Close(_)) => {
                Closed
            }
            (from, event) => {
                return Err(LifecycleError::IllegalTransition {
                    from,
                    event: event.kind(),
                });
            }
        };
        self.state = next;
        Ok(next)
    }
}
