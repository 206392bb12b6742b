//! Telemetry utilities for frame timing and session spans.

use std::time::Instant;

/// Guard for timing frame handling and recording metrics.
///
/// Records frame latency when dropped. The kind starts out as `"unparsed"`
/// and is refined once the frame has been classified.
pub struct FrameTimer {
    kind: &'static str,
    start: Instant,
}

impl FrameTimer {
    /// Start timing a frame.
    pub fn new() -> Self {
        Self {
            kind: "unparsed",
            start: Instant::now(),
        }
    }

    /// Label the frame once its kind is known.
    pub fn set_kind(&mut self, kind: &'static str) {
        self.kind = kind;
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_frame(self.kind, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for a client connection.
    pub fn connection(addr: &str, secure: bool) -> Span {
        info_span!("connection", addr = %addr, secure)
    }

    /// Create a span for an open session.
    pub fn session(user_id: &str, session_id: &str) -> Span {
        info_span!("session", user_id = %user_id, session_id = %session_id)
    }
}
