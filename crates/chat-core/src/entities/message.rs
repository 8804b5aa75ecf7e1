//! Chat message entity - one text message, direct or to a group

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{GroupId, UserId};

/// A text message as routed between nodes and persisted while the recipient is offline.
///
/// For group messages `to_uid` is the member this copy is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned id
    #[serde(rename = "server_msgid")]
    pub id: u64,
    #[serde(rename = "fromuid")]
    pub from_uid: UserId,
    #[serde(rename = "touid")]
    pub to_uid: UserId,
    #[serde(rename = "groupid", default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Sender-side sequence id used for de-duplication
    #[serde(rename = "msgid")]
    pub client_msg_id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a direct message
    pub fn direct(
        id: u64,
        from_uid: UserId,
        to_uid: UserId,
        client_msg_id: u64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            from_uid,
            to_uid,
            group_id: None,
            client_msg_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create the copy of a group message addressed to one member
    pub fn for_group_member(&self, group_id: GroupId, member: UserId) -> Self {
        Self {
            to_uid: member,
            group_id: Some(group_id),
            ..self.clone()
        }
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_message_has_no_group() {
        let msg = ChatMessage::direct(1, 10, 20, 5, "hello");
        assert!(!msg.is_group());

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["fromuid"], 10);
        assert_eq!(json["touid"], 20);
        assert_eq!(json["msgid"], 5);
        assert!(json.get("groupid").is_none());
    }

    #[test]
    fn test_group_copy_keeps_ids() {
        let msg = ChatMessage::direct(1, 10, 0, 5, "hello all");
        let copy = msg.for_group_member(99, 30);

        assert!(copy.is_group());
        assert_eq!(copy.group_id, Some(99));
        assert_eq!(copy.to_uid, 30);
        assert_eq!(copy.id, msg.id);
        assert_eq!(copy.client_msg_id, msg.client_msg_id);
    }
}
