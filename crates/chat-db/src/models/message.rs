//! Offline message database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the offline_message table
#[derive(Debug, Clone, FromRow)]
pub struct OfflineMessageModel {
    /// Insertion order
    pub seq: i64,
    pub id: i64,
    pub from_uid: i64,
    pub to_uid: i64,
    pub group_id: Option<i64>,
    pub client_msg_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
