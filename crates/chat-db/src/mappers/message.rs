//! ChatMessage <-> model mapper

use chat_core::entities::ChatMessage;

use crate::models::OfflineMessageModel;

impl From<OfflineMessageModel> for ChatMessage {
    fn from(model: OfflineMessageModel) -> Self {
        ChatMessage {
            id: model.id as u64,
            from_uid: model.from_uid as u64,
            to_uid: model.to_uid as u64,
            group_id: model.group_id.map(|g| g as u64),
            client_msg_id: model.client_msg_id as u64,
            content: model.content,
            created_at: model.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_large_ids_survive_bigint() {
        let id = u64::MAX - 5;
        let model = OfflineMessageModel {
            seq: 1,
            id: id as i64,
            from_uid: 1,
            to_uid: 2,
            group_id: Some(9),
            client_msg_id: 3,
            content: "x".to_string(),
            created_at: Utc::now(),
        };
        let msg = ChatMessage::from(model);
        assert_eq!(msg.id, id);
        assert_eq!(msg.group_id, Some(9));
    }
}
