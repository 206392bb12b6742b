//! User directory repository.

use super::{Database, DbError};
use crate::store::{Directory, StoreError, UserProfile};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Repository for user profiles.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user, or replace the display name of an existing one.
    pub async fn upsert(&self, user_id: &str, display_name: &str) -> Result<UserProfile, DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, display_name)
            VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .execute(self.pool)
        .await?;

        Ok(UserProfile {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
        })
    }

    /// Find a user by identifier.
    pub async fn find(&self, user_id: &str) -> Result<Option<UserProfile>, DbError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT user_id, display_name FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(user_id, display_name)| UserProfile {
            user_id,
            display_name,
        }))
    }

    /// Delete a user. Their messages stay in the log.
    pub async fn delete(&self, user_id: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::UserNotFound(user_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for Database {
    async fn resolve(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users().find(user_id).await?)
    }
}
