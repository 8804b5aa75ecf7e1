//! FriendApply <-> model mapper

use chat_core::entities::{ApplyStatus, FriendApply};

use crate::models::FriendApplyModel;

impl From<FriendApplyModel> for FriendApply {
    fn from(model: FriendApplyModel) -> Self {
        FriendApply {
            from_uid: model.from_uid as u64,
            to_uid: model.to_uid as u64,
            desc: model.descr,
            status: ApplyStatus::from_i16(model.status),
            created_at: model.created_at,
        }
    }
}
