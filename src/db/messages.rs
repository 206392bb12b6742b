//! Message log repository.

use super::{Database, DbError, from_millis};
use crate::store::{ChatMessage, MessageStore, NewMessage, StoreError, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// A message joined with both participants' profiles.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub sender: UserProfile,
    pub receiver: UserProfile,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

type MessageRow = (i64, String, String, String, i64);

type HistoryRow = (String, String, String, String, String, i64);

/// Repository for the message log.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message.
    pub async fn insert(&self, message: &NewMessage) -> Result<ChatMessage, DbError> {
        let millis = message.timestamp.timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, content, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .bind(millis)
        .execute(self.pool)
        .await?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            timestamp: from_millis(millis)?,
        })
    }

    /// Every message sent or received by `user_id`, oldest first.
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<ChatMessage>, DbError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, sender_id, receiver_id, content, timestamp
            FROM messages
            WHERE sender_id = ? OR receiver_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, sender_id, receiver_id, content, timestamp)| {
                Ok(ChatMessage {
                    id,
                    sender_id,
                    receiver_id,
                    content,
                    timestamp: from_millis(timestamp)?,
                })
            })
            .collect()
    }

    /// Chat history with display names, oldest first.
    ///
    /// Messages whose sender or receiver no longer exists are left out.
    pub async fn history_for(&self, user_id: &str) -> Result<Vec<HistoryRecord>, DbError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT s.user_id, s.display_name, r.user_id, r.display_name, m.content, m.timestamp
            FROM messages m
            JOIN users s ON m.sender_id = s.user_id
            JOIN users r ON m.receiver_id = r.user_id
            WHERE m.sender_id = ? OR m.receiver_id = ?
            ORDER BY m.timestamp ASC, m.id ASC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(sender_id, sender_name, receiver_id, receiver_name, content, timestamp)| {
                    Ok(HistoryRecord {
                        sender: UserProfile {
                            user_id: sender_id,
                            display_name: sender_name,
                        },
                        receiver: UserProfile {
                            user_id: receiver_id,
                            display_name: receiver_name,
                        },
                        content,
                        timestamp: from_millis(timestamp)?,
                    })
                },
            )
            .collect()
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn append(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        Ok(self.messages().insert(&message).await?)
    }

    async fn range(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.messages().for_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_message(from: &str, to: &str, content: &str, at: DateTime<Utc>) -> NewMessage {
        NewMessage {
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            content: content.to_string(),
            timestamp: at,
        }
    }

    async fn seeded() -> Database {
        let db = Database::new(":memory:").await.unwrap();
        db.users().upsert("mohammad", "Mohammad S. Khalaf").await.unwrap();
        db.users().upsert("khader", "Khader A. Murtaja").await.unwrap();
        db.users().upsert("alice", "Alice Johnson").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_range_is_ascending_and_scoped() {
        let db = seeded().await;
        let base = Utc::now() - Duration::hours(2);

        // Inserted out of order on purpose.
        db.append(new_message("mohammad", "khader", "second", base + Duration::minutes(2)))
            .await
            .unwrap();
        db.append(new_message("khader", "mohammad", "first", base))
            .await
            .unwrap();
        db.append(new_message("alice", "khader", "unrelated", base + Duration::minutes(1)))
            .await
            .unwrap();

        let history = db.range("mohammad").await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let db = seeded().await;
        let at = Utc::now();

        for content in ["a", "b", "c"] {
            db.append(new_message("mohammad", "khader", content, at))
                .await
                .unwrap();
        }

        let contents: Vec<_> = db
            .range("khader")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_append_truncates_to_millis() {
        let db = seeded().await;
        let at = Utc::now();

        let stored = db
            .append(new_message("mohammad", "khader", "hi", at))
            .await
            .unwrap();
        assert_eq!(stored.timestamp.timestamp_millis(), at.timestamp_millis());
        assert_eq!(db.range("khader").await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn test_history_joins_profiles() {
        let db = seeded().await;
        db.append(new_message("alice", "mohammad", "Congrats!", Utc::now()))
            .await
            .unwrap();

        let history = db.messages().history_for("mohammad").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender.display_name, "Alice Johnson");
        assert_eq!(history[0].receiver.display_name, "Mohammad S. Khalaf");

        db.users().delete("alice").await.unwrap();
        assert!(db.messages().history_for("mohammad").await.unwrap().is_empty());
        assert_eq!(db.range("mohammad").await.unwrap().len(), 1);
    }
}
