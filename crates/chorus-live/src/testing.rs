//! Test double for [`UpstreamSession`].

use parking_lot::Mutex;

use crate::session::UpstreamSession;

/// A call recorded by [`RecordingSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    /// `submit_text_turn`.
    TextTurn(String),
    /// `submit_realtime_media`.
    RealtimeMedia(String),
}

/// Records every submitted command in order.
#[derive(Debug, Default)]
pub struct RecordingSession {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingSession {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

impl UpstreamSession for RecordingSession {
    fn submit_text_turn(&self, text: String) {
        self.calls.lock().push(RecordedCall::TextTurn(text));
    }

    fn submit_realtime_media(&self, data: String) {
        self.calls.lock().push(RecordedCall::RealtimeMedia(data));
    }
}
