//! Unified error handling for cipherd.
//!
//! This module provides the session error taxonomy, with error-frame
//! generation and metric labeling.

use cipher_proto::{FrameError, ServerFrame};
use thiserror::Error;

use crate::store::StoreError;

// ============================================================================
// Session Errors (handshake and frame processing)
// ============================================================================

/// Errors that can occur while opening a session or handling one of its frames.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The handshake named a user the directory does not know.
    #[error("unknown user: {0}")]
    Unauthorized(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("failed to persist message: {0}")]
    PersistenceFailure(#[source] StoreError),

    /// The recipient's handle went away between lookup and enqueue.
    #[error("forward to {0} failed")]
    ForwardFailure(String),

    #[error("transport error: {0}")]
    UnexpectedTransportError(String),

    #[error("directory lookup failed: {0}")]
    DirectoryFailure(#[source] StoreError),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("session is not open")]
    NotOpen,
}

impl SessionError {
    /// Get a static error code string for metrics labeling and error frames.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::MalformedFrame(_) => "malformed_frame",
            Self::UnknownRecipient(_) => "unknown_recipient",
            Self::PersistenceFailure(_) => "persistence_failure",
            Self::ForwardFailure(_) => "forward_failure",
            Self::UnexpectedTransportError(_) => "transport_error",
            Self::DirectoryFailure(_) => "directory_failure",
            Self::RateLimited => "rate_limited",
            Self::NotOpen => "not_open",
        }
    }

    /// Whether the session must be torn down.
    ///
    /// A directory failure is fatal during the handshake, which handles it
    /// before a session exists; once open it only fails the current frame.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::UnexpectedTransportError(_) | Self::NotOpen
        )
    }

    /// Convert to an error frame for the sender.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply.
    pub fn to_frame(&self) -> Option<ServerFrame> {
        let details = match self {
            Self::MalformedFrame(e) => e.to_string(),
            Self::UnknownRecipient(user_id) => format!("User {user_id} not found"),
            Self::PersistenceFailure(_) => "message could not be stored".to_string(),
            Self::DirectoryFailure(_) => "user directory unavailable".to_string(),
            Self::RateLimited => "slow down".to_string(),

            // Silent or fatal; nothing useful to tell the client
            Self::Unauthorized(_) => return None,
            Self::ForwardFailure(_) => return None,
            Self::UnexpectedTransportError(_) => return None,
            Self::NotOpen => return None,
        };
        Some(ServerFrame::error(self.error_code(), details))
    }
}

/// Result type for session operations.
pub type SessionResult<T = ()> = Result<T, SessionError>;
