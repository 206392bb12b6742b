//! WebSocket close codes used by the server.
//!
//! Codes in the 4000-4999 range are application-defined (RFC 6455 §7.4.2).

use std::fmt;

/// Why the server is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// Orderly shutdown of the session (1000).
    Normal,
    /// The server could not complete the handshake (1011).
    InternalError,
    /// The handshake named a user that does not exist (4001).
    Unauthorized,
    /// A newer session for the same user replaced this one (4002).
    Replaced,
    /// No frames arrived within the idle timeout (4008).
    IdleTimeout,
}

impl CloseReason {
    /// Numeric close code sent in the close frame.
    pub const fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::InternalError => 1011,
            Self::Unauthorized => 4001,
            Self::Replaced => 4002,
            Self::IdleTimeout => 4008,
        }
    }

    /// Human-readable reason sent alongside the code.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Normal => "session closed",
            Self::InternalError => "internal server error",
            Self::Unauthorized => "unauthorized",
            Self::Replaced => "replaced by a newer session",
            Self::IdleTimeout => "idle timeout",
        }
    }

    /// Map a received close code back to a reason, if it is one of ours.
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1011 => Some(Self::InternalError),
            4001 => Some(Self::Unauthorized),
            4002 => Some(Self::Replaced),
            4008 => Some(Self::IdleTimeout),
            _ => None,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason(), self.code())
    }
}
