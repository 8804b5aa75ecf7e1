//! Database models - SQLx-compatible structs for PostgreSQL tables

mod friend;
mod group;
mod message;
mod user;

pub use friend::FriendApplyModel;
pub use group::GroupModel;
pub use message::OfflineMessageModel;
pub use user::UserInfoModel;
