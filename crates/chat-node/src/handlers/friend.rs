//! Friend applications (1009) and approvals (1012)
//!
//! The notification goes to the other user wherever they are connected:
//! directly when local, through the peer router otherwise. Offline users
//! see pending applications in their next login response.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use chat_core::{AddFriendNotify, AuthFriendNotify, DomainError, FriendApply, UserId, UserInfo};

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::handlers::routing::{locate, Location};
use crate::protocol::MsgId;
use crate::server::NodeState;

use super::{parse, require_session, require_user, HandlerError, HandlerResult};

#[derive(Debug, Deserialize)]
struct AddFriendRequest {
    touid: UserId,
    #[serde(default)]
    desc: String,
}

#[derive(Debug, Deserialize)]
struct AuthFriendRequest {
    fromuid: UserId,
}

async fn load_user(state: &NodeState, uid: UserId) -> HandlerResult<UserInfo> {
    Ok(state
        .users()
        .get_user_info(uid)
        .await?
        .ok_or(DomainError::UserNotFound(uid))?)
}

/// Apply to become someone's friend
pub struct AddFriendHandler;

#[async_trait]
impl MessageHandler<NodeState> for AddFriendHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let uid = require_user(require_session(session)?)?;
        let request: AddFriendRequest = parse(body)?;
        if request.touid == 0 || request.touid == uid {
            return Err(HandlerError::InvalidParams("invalid touid".to_string()));
        }

        let applicant = load_user(state, uid).await?;
        load_user(state, request.touid).await?;

        state
            .users()
            .add_friend_apply(&FriendApply::new(uid, request.touid, request.desc.clone()))
            .await?;

        let notify = AddFriendNotify {
            applyuid: uid,
            touid: request.touid,
            name: applicant.name,
            nick: applicant.nick,
            desc: request.desc,
            sex: applicant.sex,
            icon: applicant.head_image_url,
        };

        match locate(state, request.touid).await {
            Location::Local(target) => {
                target.send_json(MsgId::NotifyAddFriend, &json!(notify));
            }
            Location::Remote(node) => {
                if let Err(e) = state.peers().forward_notify_add_friend(&node, &notify).await {
                    tracing::warn!(user_id = request.touid, node = %node, error = %e, "Add-friend notify failed");
                }
            }
            Location::Offline => {}
        }

        tracing::debug!(user_id = uid, touid = request.touid, "Friend application stored");
        Ok(Reply::Body(json!({ "uid": uid, "touid": request.touid })))
    }
}

/// Accept a pending application; both users become friends
pub struct AuthFriendHandler;

#[async_trait]
impl MessageHandler<NodeState> for AuthFriendHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let uid = require_user(require_session(session)?)?;
        let request: AuthFriendRequest = parse(body)?;

        state.users().auth_friend_apply(request.fromuid, uid).await?;

        let me = load_user(state, uid).await?;
        let applicant = load_user(state, request.fromuid).await?;

        let notify = AuthFriendNotify {
            fromuid: uid,
            touid: request.fromuid,
            name: me.name,
            nick: me.nick,
            sex: me.sex,
            icon: me.head_image_url,
        };

        match locate(state, request.fromuid).await {
            Location::Local(target) => {
                target.send_json(MsgId::NotifyAuthFriend, &json!(notify));
            }
            Location::Remote(node) => {
                if let Err(e) = state.peers().forward_notify_auth_friend(&node, &notify).await {
                    tracing::warn!(user_id = request.fromuid, node = %node, error = %e, "Auth-friend notify failed");
                }
            }
            Location::Offline => {}
        }

        Ok(Reply::Body(json!({
            "uid": applicant.uid,
            "name": applicant.name,
            "nick": applicant.nick,
            "sex": applicant.sex,
            "icon": applicant.head_image_url,
        })))
    }
}

/// Add-friend notification forwarded by another node
pub struct PeerAddFriendHandler;

#[async_trait]
impl MessageHandler<NodeState> for PeerAddFriendHandler {
    async fn handle(
        &self,
        state: &NodeState,
        _session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let notify: AddFriendNotify = parse(body)?;
        let delivered = match state.presence().get_session(notify.touid) {
            Some(target) => target.send_json(MsgId::NotifyAddFriend, &json!(notify)),
            None => false,
        };
        Ok(Reply::Body(json!({ "delivered": delivered })))
    }
}

/// Auth-friend notification forwarded by another node
pub struct PeerAuthFriendHandler;

#[async_trait]
impl MessageHandler<NodeState> for PeerAuthFriendHandler {
    async fn handle(
        &self,
        state: &NodeState,
        _session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let notify: AuthFriendNotify = parse(body)?;
        let delivered = match state.presence().get_session(notify.touid) {
            Some(target) => target.send_json(MsgId::NotifyAuthFriend, &json!(notify)),
            None => false,
        };
        Ok(Reply::Body(json!({ "delivered": delivered })))
    }
}
