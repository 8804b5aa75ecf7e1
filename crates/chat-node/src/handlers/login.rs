//! Login (1005) and logout (1017) handlers

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use chat_core::{DomainError, KickUserRequest, UserId, UserInfo};

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::protocol::MsgId;
use crate::server::NodeState;

use super::routing::deliver_local;
use super::{parse, require_session, require_user, to_object, HandlerError, HandlerResult};

#[derive(Debug, Deserialize)]
struct LoginRequest {
    uid: UserId,
    /// Create or replace the profile from this request
    #[serde(default)]
    init: bool,
    #[serde(default)]
    name: String,
    #[serde(default)]
    nick: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    sex: String,
    #[serde(default)]
    age: u32,
    #[serde(default, rename = "headImageURL")]
    head_image_url: String,
}

impl LoginRequest {
    fn into_user_info(self) -> UserInfo {
        UserInfo {
            uid: self.uid,
            name: self.name,
            nick: self.nick,
            desc: self.desc,
            sex: self.sex,
            age: self.age,
            head_image_url: self.head_image_url,
        }
    }
}

/// Handles chat login
///
/// Answers 1006 itself, before replaying stored messages, so the client
/// sees its login response first.
pub struct LoginHandler;

#[async_trait]
impl MessageHandler<NodeState> for LoginHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let session = require_session(session)?;
        let request: LoginRequest = parse(body)?;
        let uid = request.uid;
        if uid == 0 {
            return Err(HandlerError::InvalidParams("uid must be non-zero".to_string()));
        }

        let info = if request.init {
            if request.name.is_empty() {
                return Err(HandlerError::InvalidParams("name is required".to_string()));
            }
            let info = request.into_user_info();
            state.users().insert_user_info(&info).await?;
            info
        } else {
            state
                .users()
                .get_user_info(uid)
                .await?
                .ok_or(DomainError::UserNotFound(uid))?
        };

        release_previous_login(state, session, uid).await;
        kick_remote_session(state, uid).await;

        if let Some(previous) = state.presence().get_session(uid) {
            if previous.id() != session.id() {
                previous.send_json(
                    MsgId::NotifyOffline,
                    &json!({ "error": 0, "uid": uid, "reason": "relogin" }),
                );
            }
        }

        state
            .presence_store()
            .set_online_user_info(uid, state.node_name())
            .await?;
        session.set_user_id(uid);
        state.presence().map_user(uid, session.clone());

        tracing::info!(session_id = %session.id(), user_id = uid, "User logged in");

        let response = login_response(state, &info).await?;
        session.send_json(MsgId::LoginRsp, &response);

        replay_offline_messages(state, session, uid).await;

        Ok(Reply::Handled)
    }
}

/// A session switching accounts gives up the old one first
async fn release_previous_login(state: &NodeState, session: &Arc<Session>, uid: UserId) {
    let old_uid = session.user_id();
    if old_uid == 0 || old_uid == uid {
        return;
    }
    if state.presence().remove_session(old_uid, session.id()) {
        if let Err(e) = state
            .presence_store()
            .del_online_user_info_if(old_uid, state.node_name())
            .await
        {
            tracing::warn!(user_id = old_uid, error = %e, "Failed to clear presence entry");
        }
    }
}

/// Ask the node currently holding `uid` to drop its session
async fn kick_remote_session(state: &NodeState, uid: UserId) {
    let node = match state.presence_store().get_online_user_info(uid).await {
        Ok(Some(node)) if node != state.node_name() => node,
        Ok(_) => return,
        Err(e) => {
            tracing::warn!(user_id = uid, error = %e, "Presence lookup failed");
            return;
        }
    };

    match state
        .peers()
        .forward_kick_user(&node, &KickUserRequest { uid })
        .await
    {
        Ok(reply) if reply.is_success() => {
            tracing::info!(user_id = uid, node = %node, "Kicked session on peer node");
        }
        Ok(reply) => {
            tracing::warn!(user_id = uid, node = %node, error = reply.error, "Peer refused kick");
        }
        Err(e) => {
            tracing::warn!(user_id = uid, node = %node, error = %e, "Kick request failed");
        }
    }
}

async fn login_response(state: &NodeState, info: &UserInfo) -> HandlerResult<Value> {
    let mut body = to_object(info)?;

    let friends = state.users().get_friend_list(info.uid).await?;
    let applies = state.users().get_apply_list(info.uid).await?;

    let mut apply_list = Vec::with_capacity(applies.len());
    for apply in applies.iter().filter(|a| a.is_pending()) {
        let applicant = state
            .users()
            .get_user_info(apply.from_uid)
            .await?
            .unwrap_or_else(|| UserInfo::new(apply.from_uid, ""));
        apply_list.push(json!({
            "uid": applicant.uid,
            "name": applicant.name,
            "nick": applicant.nick,
            "sex": applicant.sex,
            "icon": applicant.head_image_url,
            "desc": apply.desc,
            "status": apply.status.as_i16(),
        }));
    }

    body.insert("error".to_string(), Value::from(0));
    body.insert("friend_list".to_string(), json!(friends));
    body.insert("apply_list".to_string(), Value::Array(apply_list));
    Ok(Value::Object(body))
}

async fn replay_offline_messages(state: &NodeState, session: &Arc<Session>, uid: UserId) {
    let messages = match state.messages().take_offline_messages(uid).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(user_id = uid, error = %e, "Failed to load offline messages");
            return;
        }
    };
    if messages.is_empty() {
        return;
    }

    tracing::debug!(user_id = uid, count = messages.len(), "Replaying offline messages");
    for message in messages {
        if let Err(e) = deliver_local(state, session, message) {
            tracing::warn!(user_id = uid, error = %e, "Failed to replay offline message");
        }
    }
}

/// Handles logout
pub struct LogoutHandler;

#[async_trait]
impl MessageHandler<NodeState> for LogoutHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        _body: Value,
    ) -> HandlerResult<Reply> {
        let session = require_session(session)?;
        let uid = require_user(session)?;

        if state.presence().remove_session(uid, session.id()) {
            state
                .presence_store()
                .del_online_user_info_if(uid, state.node_name())
                .await?;
        }

        tracing::info!(session_id = %session.id(), user_id = uid, "User logged out");

        session.send_json(MsgId::LogoutRsp, &json!({ "error": 0, "uid": uid }));
        session.close();
        Ok(Reply::Handled)
    }
}
