//! Error types for frame parsing.

use thiserror::Error;

/// Convenience type alias for Results using [`FrameError`].
pub type Result<T, E = FrameError> = std::result::Result<T, E>;

/// Reasons an inbound frame was rejected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The payload is JSON but not an object.
    #[error("frame must be a JSON object")]
    NotAnObject,

    /// The `type` field is present but not a string.
    #[error("frame type must be a string")]
    InvalidType,

    /// The `type` field names a frame kind the server does not know.
    #[error("unknown frame type: {0}")]
    UnknownType(String),

    /// A required field is missing or has the wrong shape.
    #[error("invalid {kind} frame: {source}")]
    InvalidFields {
        /// Frame kind being decoded.
        kind: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Chat content is empty or whitespace.
    #[error("message content must not be empty")]
    EmptyContent,

    /// Chat content exceeds the configured limit (in characters).
    #[error("message content too long: {actual} characters (limit {limit})")]
    ContentTooLong {
        /// Length of the rejected content.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The frame exceeds the configured size (in bytes).
    #[error("frame too large: {actual} bytes (limit {limit})")]
    FrameTooLarge {
        /// Size of the rejected frame.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// A binary WebSocket message was received; only text frames are accepted.
    #[error("binary frames are not supported")]
    NotText,
}
