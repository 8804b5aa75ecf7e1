//! UserInfo <-> model mapper

use chat_core::entities::UserInfo;

use crate::models::UserInfoModel;

impl From<UserInfoModel> for UserInfo {
    fn from(model: UserInfoModel) -> Self {
        UserInfo {
            uid: model.uid as u64,
            name: model.name,
            nick: model.nick,
            desc: model.descr,
            sex: model.sex,
            age: u32::try_from(model.age).unwrap_or_default(),
            head_image_url: model.head_image_url,
        }
    }
}
