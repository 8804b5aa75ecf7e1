//! Group <-> model mapper

use chat_core::entities::Group;

use crate::models::GroupModel;

impl From<GroupModel> for Group {
    fn from(model: GroupModel) -> Self {
        Group {
            id: model.id as u64,
            name: model.name,
            owner_uid: model.owner_uid as u64,
            created_at: model.created_at,
        }
    }
}
