//! Response error codes
//!
//! Every response body carries an integer `"error"` field; `0` is success.

use serde::{Serialize, Serializer};

/// Error codes carried in response envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    /// Body is not valid JSON or misses required fields
    JsonParser = 1001,
    /// A peer node could not be reached or answered with an error
    RpcFailed = 1002,
    /// Unknown message type id
    NotFound = 1003,
    InvalidParams = 1004,
    /// Duplicate `(sender, msgid)` inside the de-duplication window
    RepeatMessage = 1005,
    /// Request sent before login
    NotAuthenticated = 1006,
    StoreFailed = 1007,
    Internal = 1008,
}

impl ErrorCode {
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1001 => Some(Self::JsonParser),
            1002 => Some(Self::RpcFailed),
            1003 => Some(Self::NotFound),
            1004 => Some(Self::InvalidParams),
            1005 => Some(Self::RepeatMessage),
            1006 => Some(Self::NotAuthenticated),
            1007 => Some(Self::StoreFailed),
            1008 => Some(Self::Internal),
            _ => None,
        }
    }

    /// Get the raw value
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Human readable description, used as the envelope's `"message"`
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::JsonParser => "Malformed request body",
            Self::RpcFailed => "Peer node request failed",
            Self::NotFound => "Unknown message type",
            Self::InvalidParams => "Invalid parameters",
            Self::RepeatMessage => "Message already received",
            Self::NotAuthenticated => "Login required",
            Self::StoreFailed => "Storage failure",
            Self::Internal => "Internal error",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.as_i32())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}
