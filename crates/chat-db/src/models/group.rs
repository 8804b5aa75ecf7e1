//! Group database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the chat_group table
#[derive(Debug, Clone, FromRow)]
pub struct GroupModel {
    pub id: i64,
    pub name: String,
    pub owner_uid: i64,
    pub created_at: DateTime<Utc>,
}
