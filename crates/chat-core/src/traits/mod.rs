//! Collaborator traits - the only way the node core reaches storage and peers
//!
//! The node defines what it needs here; `chat-db`, `chat-cache` and
//! `chat-node::peer` provide the implementations.

mod peer;
mod stores;

pub use peer::{AddFriendNotify, AuthFriendNotify, KickUserRequest, PeerReply, PeerRouter};
pub use stores::{MessageStore, PresenceStore, RepoResult, UserStore};
