//! User database model

use sqlx::FromRow;

/// Database model for the user_info table
#[derive(Debug, Clone, FromRow)]
pub struct UserInfoModel {
    pub uid: i64,
    pub name: String,
    pub nick: String,
    pub descr: String,
    pub sex: String,
    pub age: i32,
    pub head_image_url: String,
}
