//! PostgreSQL implementation of MessageStore

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use chat_core::entities::ChatMessage;
use chat_core::traits::{MessageStore, RepoResult};
use chat_core::value_objects::UserId;

use crate::models::OfflineMessageModel;
use crate::pool::PgConnectionPool;

use super::acquire;
use super::error::map_db_error;

/// PostgreSQL implementation of MessageStore
#[derive(Clone)]
pub struct PgMessageStore {
    pool: Arc<PgConnectionPool>,
}

impl PgMessageStore {
    pub fn new(pool: Arc<PgConnectionPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    #[instrument(skip(self, message), fields(to = message.to_uid, id = message.id))]
    async fn save_offline_message(&self, message: &ChatMessage) -> RepoResult<()> {
        let mut conn = acquire(&self.pool).await?;
        sqlx::query(
            r"
            INSERT INTO offline_message
                (id, from_uid, to_uid, group_id, client_msg_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(message.id as i64)
        .bind(message.from_uid as i64)
        .bind(message.to_uid as i64)
        .bind(message.group_id.map(|g| g as i64))
        .bind(message.client_msg_id as i64)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn take_offline_messages(&self, uid: UserId) -> RepoResult<Vec<ChatMessage>> {
        let mut conn = acquire(&self.pool).await?;
        let mut rows = sqlx::query_as::<_, OfflineMessageModel>(
            r"
            DELETE FROM offline_message
            WHERE to_uid = $1
            RETURNING seq, id, from_uid, to_uid, group_id, client_msg_id, content, created_at
            ",
        )
        .bind(uid as i64)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        // RETURNING has no defined order
        rows.sort_by_key(|r| r.seq);
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    #[instrument(skip(self))]
    async fn count_offline_messages(&self, uid: UserId) -> RepoResult<usize> {
        let mut conn = acquire(&self.pool).await?;
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM offline_message WHERE to_uid = $1")
                .bind(uid as i64)
                .fetch_one(&mut *conn)
                .await
                .map_err(map_db_error)?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}
