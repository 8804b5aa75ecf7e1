//! Domain errors - error type returned by every storage and routing collaborator

use thiserror::Error;

use crate::value_objects::{GroupId, UserId};

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Friend application from {from} to {to} not found")]
    ApplyNotFound { from: UserId, to: UserId },

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("User already exists: {0}")]
    UserAlreadyExists(UserId),

    #[error("Already a member of this group")]
    AlreadyMember,

    #[error("Not a member of this group")]
    NotMember,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Peer node unavailable: {0}")]
    PeerUnavailable(String),

    #[error("RPC to peer failed: {0}")]
    RpcFailed(String),
}

impl DomainError {
    /// Get an error code string for logs and peer replies
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "UNKNOWN_USER",
            Self::GroupNotFound(_) => "UNKNOWN_GROUP",
            Self::ApplyNotFound { .. } => "UNKNOWN_APPLY",
            Self::UserAlreadyExists(_) => "USER_ALREADY_EXISTS",
            Self::AlreadyMember => "ALREADY_MEMBER",
            Self::NotMember => "NOT_MEMBER",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::PoolClosed => "POOL_CLOSED",
            Self::PeerUnavailable(_) => "PEER_UNAVAILABLE",
            Self::RpcFailed(_) => "RPC_FAILED",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::GroupNotFound(_) | Self::ApplyNotFound { .. }
        )
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::UserAlreadyExists(_) | Self::AlreadyMember | Self::NotMember
        )
    }

    /// Check if the failure came from talking to another node
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, Self::PeerUnavailable(_) | Self::RpcFailed(_))
    }
}
