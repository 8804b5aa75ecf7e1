//! Frame type and header variants

use bytes::Bytes;
use chat_common::ClientProtocol;
use serde::Serialize;
use serde_json::Value;

use chat_core::UserId;

/// Header layout used on a connection
///
/// All integers are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    /// `msg_id: u32`, `body_len: u32`
    Standard,
    /// `msg_id: u16`, `body_len: u16`
    Compact,
    /// `from_uid: u64`, `device_id: u16`, `msg_id: u32`, `body_len: u32`
    Peer,
}

impl ProtocolVariant {
    /// Size of the fixed header in bytes
    #[must_use]
    pub const fn header_len(self) -> usize {
        match self {
            Self::Standard => 8,
            Self::Compact => 4,
            Self::Peer => 18,
        }
    }

    /// Largest body length the header can express
    #[must_use]
    pub const fn max_encodable_body(self) -> usize {
        match self {
            Self::Compact => u16::MAX as usize,
            Self::Standard | Self::Peer => u32::MAX as usize,
        }
    }

    /// Largest message id the header can express
    #[must_use]
    pub const fn max_msg_id(self) -> u32 {
        match self {
            Self::Compact => u16::MAX as u32,
            Self::Standard | Self::Peer => u32::MAX,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_peer(self) -> bool {
        matches!(self, Self::Peer)
    }
}

impl From<ClientProtocol> for ProtocolVariant {
    fn from(protocol: ClientProtocol) -> Self {
        match protocol {
            ClientProtocol::Standard => Self::Standard,
            ClientProtocol::Compact => Self::Compact,
        }
    }
}

/// Routing prefix of peer frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PeerRoute {
    pub from_uid: UserId,
    pub device_id: u16,
}

/// One decoded protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_id: u32,
    pub body: Bytes,
    /// Present on peer connections only
    pub route: Option<PeerRoute>,
}

impl Frame {
    pub fn new(msg_id: impl Into<u32>, body: impl Into<Bytes>) -> Self {
        Self {
            msg_id: msg_id.into(),
            body: body.into(),
            route: None,
        }
    }

    /// Frame whose body is the JSON encoding of `body`
    pub fn json<T: Serialize + ?Sized>(
        msg_id: impl Into<u32>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(body)?;
        Ok(Self::new(msg_id, body))
    }

    /// Frame from an already built JSON value
    pub fn from_value(msg_id: impl Into<u32>, body: &Value) -> Self {
        Self::new(msg_id, body.to_string())
    }

    pub fn with_route(mut self, route: Option<PeerRoute>) -> Self {
        self.route = route;
        self
    }

    /// Decode the body as JSON. An empty body is the empty object.
    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        if self.body.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&self.body)
    }
}
