//! Handler error types

use serde_json::{json, Value};
use thiserror::Error;

use chat_core::DomainError;

use crate::protocol::ErrorCode;

/// Per-message failure, answered with an error envelope
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Body is not valid JSON for this message
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Request requires a logged-in session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Message arrived on a connection that cannot carry it
    #[error("Unsupported message: {0}")]
    Unsupported(u32),

    /// Domain error (from stores and the peer router)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Wire code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPayload(_) => ErrorCode::JsonParser,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::Unsupported(_) => ErrorCode::NotFound,
            Self::Domain(e) if e.is_peer_failure() => ErrorCode::RpcFailed,
            Self::Domain(e) if e.is_not_found() || e.is_conflict() => ErrorCode::InvalidParams,
            Self::Domain(_) => ErrorCode::StoreFailed,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Response body: `{"error": code, "message": text}`
    pub fn to_envelope(&self) -> Value {
        json!({
            "error": self.code(),
            "message": self.to_string(),
        })
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidPayload(e.to_string())
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            HandlerError::InvalidPayload("x".into()).code(),
            ErrorCode::JsonParser
        );
        assert_eq!(HandlerError::NotAuthenticated.code(), ErrorCode::NotAuthenticated);
        assert_eq!(
            HandlerError::from(DomainError::PeerUnavailable("node-2".into())).code(),
            ErrorCode::RpcFailed
        );
        assert_eq!(
            HandlerError::from(DomainError::GroupNotFound(3)).code(),
            ErrorCode::InvalidParams
        );
        assert_eq!(
            HandlerError::from(DomainError::DatabaseError("down".into())).code(),
            ErrorCode::StoreFailed
        );
    }

    #[test]
    fn test_envelope() {
        let envelope = HandlerError::NotAuthenticated.to_envelope();
        assert_eq!(envelope["error"], 1006);
        assert_eq!(envelope["message"], "Not authenticated");
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(HandlerError::from(err).code(), ErrorCode::JsonParser);
    }
}
