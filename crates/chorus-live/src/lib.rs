//! # chorus-live
//!
//! The single long-lived upstream streaming session shared by every client.
//!
//! - [`types`]: JSON wire frames (setup, text turns, realtime audio, server messages)
//! - [`lifecycle`]: inbound events and the `Uninitialized → Open → Closed` state machine
//! - [`session`]: the [`UpstreamSession`] send surface and the [`LiveSession`] WebSocket client
//! - [`testing`]: a recording [`UpstreamSession`] for tests in downstream crates
//!
//! ## Data Flow
//!
//! Callers submit text turns and audio chunks through [`UpstreamSession`];
//! they are queued and written by the session's I/O task. Everything the
//! upstream sends back arrives as [`UpstreamEvent`]s on the channel returned
//! by [`LiveSession::connect`].

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod session;
pub mod testing;
pub mod types;

pub use config::LiveConfig;
pub use errors::LiveError;
pub use lifecycle::{CloseInfo, LifecycleError, SessionLifecycle, SessionState, UpstreamEvent};
pub use session::{LiveSession, UpstreamSession};
pub use testing::{RecordedCall, RecordingSession};
pub use types::{Blob, ClientFrame, REALTIME_AUDIO_MIME_TYPE, ServerMessage};
