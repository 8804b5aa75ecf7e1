//! Friend application entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// State of a friend application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    #[default]
    Pending,
    Accepted,
}

impl ApplyStatus {
    /// Numeric form stored in the database
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Accepted => 1,
        }
    }

    /// Parse the numeric form; unknown values are treated as pending
    pub const fn from_i16(value: i16) -> Self {
        match value {
            1 => Self::Accepted,
            _ => Self::Pending,
        }
    }
}

/// A request from `from_uid` to become friends with `to_uid`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendApply {
    pub from_uid: UserId,
    pub to_uid: UserId,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub status: ApplyStatus,
    pub created_at: DateTime<Utc>,
}

impl FriendApply {
    /// Create a pending application
    pub fn new(from_uid: UserId, to_uid: UserId, desc: impl Into<String>) -> Self {
        Self {
            from_uid,
            to_uid,
            desc: desc.into(),
            status: ApplyStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == ApplyStatus::Pending
    }
}
