//! Storage traits (ports) for users, social graph, offline messages and presence

use std::time::Duration;

use async_trait::async_trait;

use crate::entities::{ChatMessage, FriendApply, Group, UserInfo};
use crate::error::DomainError;
use crate::value_objects::{GroupId, UserId};

/// Result type for store operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// User Store
// ============================================================================

/// Users, friendships and group membership
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by account name
    async fn get_user(&self, name: &str) -> RepoResult<Option<UserInfo>>;

    /// Find a user by id
    async fn get_user_info(&self, uid: UserId) -> RepoResult<Option<UserInfo>>;

    /// Insert or replace the profile of a user
    async fn insert_user_info(&self, info: &UserInfo) -> RepoResult<()>;

    /// Record a friend application; a repeated application replaces the previous one
    async fn add_friend_apply(&self, apply: &FriendApply) -> RepoResult<()>;

    /// Applications addressed to `to_uid`, oldest first
    async fn get_apply_list(&self, to_uid: UserId) -> RepoResult<Vec<FriendApply>>;

    /// Accept the application `from_uid -> to_uid` and make both users friends
    async fn auth_friend_apply(&self, from_uid: UserId, to_uid: UserId) -> RepoResult<()>;

    /// Friends of `uid`
    async fn get_friend_list(&self, uid: UserId) -> RepoResult<Vec<UserInfo>>;

    /// Create a group; the owner becomes its first member
    async fn create_group(&self, group: &Group) -> RepoResult<()>;

    async fn get_group(&self, group_id: GroupId) -> RepoResult<Option<Group>>;

    /// Add a member. Fails with `AlreadyMember` if present.
    async fn join_group(&self, group_id: GroupId, uid: UserId) -> RepoResult<()>;

    /// Remove a member. Fails with `NotMember` if absent.
    async fn quit_group(&self, group_id: GroupId, uid: UserId) -> RepoResult<()>;

    /// Member ids in join order
    async fn get_group_members(&self, group_id: GroupId) -> RepoResult<Vec<UserId>>;
}

// ============================================================================
// Message Store
// ============================================================================

/// Persistence for messages that could not be delivered
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save_offline_message(&self, message: &ChatMessage) -> RepoResult<()>;

    /// Remove and return every stored message for `uid`, in the order they were saved
    async fn take_offline_messages(&self, uid: UserId) -> RepoResult<Vec<ChatMessage>>;

    async fn count_offline_messages(&self, uid: UserId) -> RepoResult<usize>;
}

// ============================================================================
// Presence Store
// ============================================================================

/// Cluster-wide presence (`uid -> node name`) and message de-duplication keys
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn set_online_user_info(&self, uid: UserId, node: &str) -> RepoResult<()>;

    /// Name of the node currently serving `uid`
    async fn get_online_user_info(&self, uid: UserId) -> RepoResult<Option<String>>;

    async fn del_online_user_info(&self, uid: UserId) -> RepoResult<()>;

    /// Delete the entry only if it still names `node`. Returns whether it was deleted.
    async fn del_online_user_info_if(&self, uid: UserId, node: &str) -> RepoResult<bool>;

    /// Record `(uid, msg_id)` for `ttl`. Returns `false` if it was already recorded.
    async fn set_user_msg_id(&self, uid: UserId, msg_id: u64, ttl: Duration) -> RepoResult<bool>;

    async fn get_user_msg_id(&self, uid: UserId, msg_id: u64) -> RepoResult<bool>;

    /// Refresh the expiry of a recorded key. Returns `false` if the key is gone.
    async fn expire_user_msg_id(&self, uid: UserId, msg_id: u64, ttl: Duration)
        -> RepoResult<bool>;

    /// Forget a recorded key so a retransmission is processed again.
    /// Returns `false` if there was nothing to forget.
    async fn del_user_msg_id(&self, uid: UserId, msg_id: u64) -> RepoResult<bool>;
}
