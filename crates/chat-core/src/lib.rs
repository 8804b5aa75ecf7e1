//! # chat-core
//!
//! Domain layer for the IM node: identifiers, entities, the error type shared by
//! every storage collaborator, and the collaborator traits themselves.
//!
//! The node core only ever talks to storage and to peer nodes through the traits
//! in [`traits`]. Concrete adapters live in `chat-db` (PostgreSQL), `chat-cache`
//! (Redis) and `chat-node` (peer routing); [`memory`] provides in-process
//! implementations for single-node deployments and tests.

pub mod entities;
pub mod error;
pub mod memory;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{ApplyStatus, ChatMessage, FriendApply, Group, UserInfo};
pub use error::DomainError;
pub use memory::{MemoryMessageStore, MemoryPresenceStore, MemoryUserStore};
pub use traits::{
    AddFriendNotify, AuthFriendNotify, KickUserRequest, MessageStore, PeerReply, PeerRouter,
    PresenceStore, RepoResult, UserStore,
};
pub use value_objects::{GroupId, IdGenerator, UserId};
