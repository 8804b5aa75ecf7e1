//! Message handlers
//!
//! One handler per request type. Client requests run with the originating
//! session; requests forwarded by a peer node run without one.

mod ack;
mod error;
mod friend;
mod group;
mod heartbeat;
mod kick;
mod login;
mod routing;
mod search;
mod text;

pub use error::{HandlerError, HandlerResult};
pub use routing::{deliver_local, route_message, Routed};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use chat_core::UserId;

use crate::connection::Session;
use crate::dispatch::{Accepts, HandlerRegistry};
use crate::protocol::MsgId;
use crate::server::NodeState;

/// Registry with every handler of a node
pub fn build_registry() -> HandlerRegistry<NodeState> {
    let mut registry = HandlerRegistry::new();

    registry.register(
        MsgId::HeartbeatReq,
        Some(MsgId::HeartbeatRsp.as_u32()),
        Accepts::Both,
        heartbeat::HeartbeatHandler,
    );
    registry.register(
        MsgId::LoginReq,
        Some(MsgId::LoginRsp.as_u32()),
        Accepts::Client,
        login::LoginHandler,
    );
    registry.register(
        MsgId::LogoutReq,
        Some(MsgId::LogoutRsp.as_u32()),
        Accepts::Client,
        login::LogoutHandler,
    );
    registry.register(
        MsgId::SearchUserReq,
        Some(MsgId::SearchUserRsp.as_u32()),
        Accepts::Client,
        search::SearchUserHandler,
    );
    registry.register(
        MsgId::AddFriendReq,
        Some(MsgId::AddFriendRsp.as_u32()),
        Accepts::Client,
        friend::AddFriendHandler,
    );
    registry.register(
        MsgId::AuthFriendReq,
        Some(MsgId::AuthFriendRsp.as_u32()),
        Accepts::Client,
        friend::AuthFriendHandler,
    );
    registry.register(
        MsgId::TextChatReq,
        Some(MsgId::TextChatRsp.as_u32()),
        Accepts::Client,
        text::TextChatHandler,
    );
    registry.register(
        MsgId::CreateGroupReq,
        Some(MsgId::CreateGroupRsp.as_u32()),
        Accepts::Client,
        group::CreateGroupHandler,
    );
    registry.register(
        MsgId::JoinGroupReq,
        Some(MsgId::JoinGroupRsp.as_u32()),
        Accepts::Client,
        group::JoinGroupHandler,
    );
    registry.register(
        MsgId::QuitGroupReq,
        Some(MsgId::QuitGroupRsp.as_u32()),
        Accepts::Client,
        group::QuitGroupHandler,
    );
    registry.register(
        MsgId::GroupTextReq,
        Some(MsgId::GroupTextRsp.as_u32()),
        Accepts::Client,
        group::GroupTextHandler,
    );
    registry.register(
        MsgId::GroupMembersReq,
        Some(MsgId::GroupMembersRsp.as_u32()),
        Accepts::Client,
        group::GroupMembersHandler,
    );
    registry.register(
        MsgId::AckReq,
        Some(MsgId::AckRsp.as_u32()),
        Accepts::Client,
        ack::AckHandler,
    );
    registry.register(
        MsgId::PeerTextReq,
        Some(MsgId::PeerTextRsp.as_u32()),
        Accepts::Peer,
        text::PeerTextHandler,
    );
    registry.register(
        MsgId::PeerAddFriendReq,
        Some(MsgId::PeerAddFriendRsp.as_u32()),
        Accepts::Peer,
        friend::PeerAddFriendHandler,
    );
    registry.register(
        MsgId::PeerAuthFriendReq,
        Some(MsgId::PeerAuthFriendRsp.as_u32()),
        Accepts::Peer,
        friend::PeerAuthFriendHandler,
    );
    registry.register(
        MsgId::PeerKickReq,
        Some(MsgId::PeerKickRsp.as_u32()),
        Accepts::Peer,
        kick::PeerKickHandler,
    );

    registry
}

/// Decode a request body
fn parse<T: DeserializeOwned>(body: Value) -> HandlerResult<T> {
    Ok(serde_json::from_value(body)?)
}

/// Serialize into a JSON object so fields can be added
fn to_object<T: Serialize>(value: &T) -> HandlerResult<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(HandlerError::Internal(format!("expected object, got {other}"))),
        Err(e) => Err(HandlerError::Internal(e.to_string())),
    }
}

/// The originating session of a client request
fn require_session(session: Option<&Arc<Session>>) -> HandlerResult<&Arc<Session>> {
    session.ok_or_else(|| HandlerError::Internal("request has no local session".to_string()))
}

/// The logged-in user of a client request
fn require_user(session: &Session) -> HandlerResult<UserId> {
    match session.user_id() {
        0 => Err(HandlerError::NotAuthenticated),
        uid => Ok(uid),
    }
}
