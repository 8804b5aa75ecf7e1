//! User entity - profile data shown to other users

use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// Public profile of a user
///
/// Field names follow the wire format used by clients (`headImageURL`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: UserId,
    pub name: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default, rename = "headImageURL")]
    pub head_image_url: String,
}

impl UserInfo {
    /// Create a profile with only the mandatory fields set
    pub fn new(uid: UserId, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            nick: String::new(),
            desc: String::new(),
            sex: String::new(),
            age: 0,
            head_image_url: String::new(),
        }
    }

    /// Nickname if set, otherwise the account name
    pub fn display_name(&self) -> &str {
        if self.nick.is_empty() {
            &self.name
        } else {
            &self.nick
        }
    }
}
