//! Records shared by the directory, the store, and the session core.

use chrono::{DateTime, Utc};
use cipher_proto::{ForwardedChat, PresenceEntry};
use serde::{Deserialize, Serialize};

/// A user known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
}

/// A message accepted for persistence but not yet stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<UserProfile> for PresenceEntry {
    fn from(profile: UserProfile) -> Self {
        PresenceEntry {
            user_id: profile.user_id,
            display_name: profile.display_name,
        }
    }
}

impl From<&ChatMessage> for ForwardedChat {
    fn from(message: &ChatMessage) -> Self {
        ForwardedChat {
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}
