//! Peer routing trait and the payloads exchanged between nodes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RepoResult;
use crate::entities::ChatMessage;
use crate::value_objects::UserId;

/// Reply envelope returned by a peer node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerReply {
    pub error: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PeerReply {
    pub fn ok() -> Self {
        Self {
            error: 0,
            message: None,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.error == 0
    }
}

/// Ask a peer to drop a user's session (relogin on another node)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickUserRequest {
    pub uid: UserId,
}

/// Friend application forwarded to the node holding the applicant's target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFriendNotify {
    pub applyuid: UserId,
    pub touid: UserId,
    pub name: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub icon: String,
}

/// Friend acceptance forwarded to the node holding the original applicant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFriendNotify {
    pub fromuid: UserId,
    pub touid: UserId,
    pub name: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub icon: String,
}

/// Forwards work to the node that owns a user's session
///
/// `node` is the peer node name as recorded in the presence store.
#[async_trait]
pub trait PeerRouter: Send + Sync {
    async fn forward_text_message(&self, node: &str, message: &ChatMessage)
        -> RepoResult<PeerReply>;

    async fn forward_notify_add_friend(
        &self,
        node: &str,
        notify: &AddFriendNotify,
    ) -> RepoResult<PeerReply>;

    async fn forward_notify_auth_friend(
        &self,
        node: &str,
        notify: &AuthFriendNotify,
    ) -> RepoResult<PeerReply>;

    async fn forward_kick_user(&self, node: &str, request: &KickUserRequest)
        -> RepoResult<PeerReply>;
}
