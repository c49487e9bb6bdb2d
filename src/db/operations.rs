use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{ChatMessage, DirectMessage, NewChatMessage, NewDirectMessage};
use crate::error::AppError;

/// Storage operations the realtime subsystem depends on. A message must
/// be durably stored through this trait *before* its fan-out event is
/// dispatched, so every delivered notification corresponds to a record
/// that can be re-fetched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store_direct_message(&self, new: NewDirectMessage) -> Result<DirectMessage, AppError>;

    async fn store_room_message(&self, new: NewChatMessage) -> Result<ChatMessage, AppError>;

    /// Full bidirectional history for one user, both sides of every
    /// conversation. Input to the conversation aggregator.
    async fn fetch_all_messages_involving(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<DirectMessage>, AppError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError>;

    async fn mark_conversation_read(
        &self,
        reader_id: Uuid,
        counterparty_id: Uuid,
    ) -> Result<u64, AppError>;
}

pub struct PgMessageStore {
    pool: Arc<PgPool>,
}

impl PgMessageStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn store_direct_message(&self, new: NewDirectMessage) -> Result<DirectMessage, AppError> {
        let message = sqlx::query_as::<_, DirectMessage>(
            r#"
            INSERT INTO direct_messages (sender_id, receiver_id, sender_name, content, image, video)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sender_id, receiver_id, sender_name, content, image, video, is_read, created_at
            "#,
        )
        .bind(new.sender_id)
        .bind(new.receiver_id)
        .bind(&new.sender_name)
        .bind(&new.content)
        .bind(&new.image)
        .bind(&new.video)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(message)
    }

    async fn store_room_message(&self, new: NewChatMessage) -> Result<ChatMessage, AppError> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (room_id, sender_id, sender_name, content, image, video)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, room_id, sender_id, sender_name, content, image, video, created_at
            "#,
        )
        .bind(&new.room_id)
        .bind(new.sender_id)
        .bind(&new.sender_name)
        .bind(&new.content)
        .bind(&new.image)
        .bind(&new.video)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(message)
    }

    async fn fetch_all_messages_involving(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<DirectMessage>, AppError> {
        let messages = sqlx::query_as::<_, DirectMessage>(
            r#"
            SELECT id, sender_id, receiver_id, sender_name, content, image, video, is_read, created_at
            FROM direct_messages
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(messages)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM direct_messages WHERE receiver_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn mark_conversation_read(
        &self,
        reader_id: Uuid,
        counterparty_id: Uuid,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE direct_messages
            SET is_read = TRUE
            WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(counterparty_id)
        .bind(reader_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}
