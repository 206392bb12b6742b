//! Inbound and outbound frame shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FrameError, Result};

/// Frame type assumed when a client omits `type` (legacy callers).
pub const DEFAULT_FRAME_TYPE: &str = "message";

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// `{"type":"message","receiverId":..,"content":..}`
    Chat(ChatFrame),
    /// `{"type":"presence"}`
    Presence,
}

/// Body of an inbound chat frame.
///
/// Any sender field a client puts in the body is ignored: the sender is
/// always the authenticated owner of the session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFrame {
    /// Recipient user identifier.
    pub receiver_id: String,
    /// Message text.
    pub content: String,
}

impl ClientFrame {
    /// Parse a text frame.
    ///
    /// The payload must be a JSON object. A missing `type` is treated as
    /// `"message"`. Chat content must contain at least one non-whitespace
    /// character.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;
        let Value::Object(mut object) = value else {
            return Err(FrameError::NotAnObject);
        };

        let kind = match object.remove("type") {
            None | Some(Value::Null) => DEFAULT_FRAME_TYPE.to_string(),
            Some(Value::String(kind)) => kind,
            Some(_) => return Err(FrameError::InvalidType),
        };

        match kind.as_str() {
            "message" => {
                let chat: ChatFrame = serde_json::from_value(Value::Object(object))
                    .map_err(|source| FrameError::InvalidFields {
                        kind: "message",
                        source,
                    })?;
                if chat.content.trim().is_empty() {
                    return Err(FrameError::EmptyContent);
                }
                Ok(Self::Chat(chat))
            }
            "presence" => Ok(Self::Presence),
            _ => Err(FrameError::UnknownType(kind)),
        }
    }

    /// Short label for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => "message",
            Self::Presence => "presence",
        }
    }
}

impl ChatFrame {
    /// Reject content longer than `limit` characters.
    pub fn check_length(&self, limit: usize) -> Result<()> {
        let actual = self.content.chars().count();
        if actual > limit {
            return Err(FrameError::ContentTooLong { actual, limit });
        }
        Ok(())
    }
}

/// One online user in a presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    /// User identifier.
    pub user_id: String,
    /// Display name from the directory.
    pub display_name: String,
}

/// A persisted chat message delivered to its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedChat {
    /// Authenticated sender.
    pub sender_id: String,
    /// Recipient.
    pub receiver_id: String,
    /// Message text.
    pub content: String,
    /// Server-assigned timestamp.
    pub timestamp: DateTime<Utc>,
}

/// A frame sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Users currently holding a live session.
    Presence {
        /// Online users.
        users: Vec<PresenceEntry>,
        /// Number of entries in `users`.
        count: usize,
    },
    /// A forwarded chat message.
    Message(ForwardedChat),
    /// A per-frame error, reported to the sender only.
    Error {
        /// Stable error code.
        error: String,
        /// Human-readable description.
        details: String,
    },
}

impl ServerFrame {
    /// Build a presence frame; `count` always matches `users.len()`.
    pub fn presence(users: Vec<PresenceEntry>) -> Self {
        let count = users.len();
        Self::Presence { users, count }
    }

    /// Build an error frame.
    pub fn error(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            details: details.into(),
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(text) => text,
            // Only reachable if a field's Serialize impl fails, which none of ours do.
            Err(_) => r#"{"type":"error","error":"internal","details":"encode failed"}"#.to_string(),
        }
    }
}
