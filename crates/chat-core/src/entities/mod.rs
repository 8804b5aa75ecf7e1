//! Domain entities - core business objects

mod friend;
mod group;
mod message;
mod user;

pub use friend::{ApplyStatus, FriendApply};
pub use group::Group;
pub use message::ChatMessage;
pub use user::UserInfo;
