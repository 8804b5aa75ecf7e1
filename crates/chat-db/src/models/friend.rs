//! Friend application database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the friend_apply table
#[derive(Debug, Clone, FromRow)]
pub struct FriendApplyModel {
    pub from_uid: i64,
    pub to_uid: i64,
    pub descr: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}
