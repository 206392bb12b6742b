//! Directory and message store abstractions.
//!
//! The session core only sees these two traits. [`crate::db::Database`]
//! implements both on top of SQLite.

use async_trait::async_trait;
use thiserror::Error;

pub mod types;

pub use types::{ChatMessage, NewMessage, UserProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] crate::db::DbError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of user profiles.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a profile; `Ok(None)` when the user does not exist.
    async fn resolve(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;
}

/// Append-only message log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a message. Returns once the write has completed.
    async fn append(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// All messages sent or received by `user_id`, oldest first.
    async fn range(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError>;
}
