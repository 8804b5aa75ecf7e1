//! Group entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{GroupId, UserId};

/// A chat group. Membership is stored separately by the [`UserStore`](crate::UserStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "groupid")]
    pub id: GroupId,
    pub name: String,
    #[serde(rename = "owner")]
    pub owner_uid: UserId,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Create a new group
    pub fn new(id: GroupId, name: impl Into<String>, owner_uid: UserId) -> Self {
        Self {
            id,
            name: name.into(),
            owner_uid,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_owner(&self, uid: UserId) -> bool {
        self.owner_uid == uid
    }
}
