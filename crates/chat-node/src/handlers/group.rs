//! Groups: create, join, quit, member list and text fan-out
//!
//! Join and quit notifications reach members connected to this node only.
//! Group text goes through normal message routing, one copy per member.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use chat_core::{ChatMessage, DomainError, Group, GroupId, UserId};

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::protocol::{ErrorCode, MsgId};
use crate::server::NodeState;

use super::routing::{route_message, Routed};
use super::text::{first_sighting, forget_sighting};
use super::{parse, require_session, require_user, HandlerError, HandlerResult};

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GroupRequest {
    groupid: GroupId,
}

#[derive(Debug, Deserialize)]
struct GroupTextRequest {
    groupid: GroupId,
    msgid: u64,
    content: String,
}

async fn load_group(state: &NodeState, group_id: GroupId) -> HandlerResult<Group> {
    Ok(state
        .users()
        .get_group(group_id)
        .await?
        .ok_or(DomainError::GroupNotFound(group_id))?)
}

/// Send a notification to every locally connected member except `skip`
async fn notify_local_members(
    state: &NodeState,
    group_id: GroupId,
    skip: UserId,
    msg_id: MsgId,
    body: &Value,
) -> HandlerResult<usize> {
    let members = state.users().get_group_members(group_id).await?;
    let mut notified = 0;
    for member in members.into_iter().filter(|m| *m != skip) {
        if let Some(target) = state.presence().get_session(member) {
            if target.send_json(msg_id, body) {
                notified += 1;
            }
        }
    }
    Ok(notified)
}

pub struct CreateGroupHandler;

#[async_trait]
impl MessageHandler<NodeState> for CreateGroupHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let uid = require_user(require_session(session)?)?;
        let request: CreateGroupRequest = parse(body)?;
        if request.name.trim().is_empty() {
            return Err(HandlerError::InvalidParams("group name is required".to_string()));
        }

        let group = Group::new(state.ids().generate(), request.name, uid);
        state.users().create_group(&group).await?;

        tracing::info!(user_id = uid, group_id = group.id, "Group created");
        Ok(Reply::Body(json!(group)))
    }
}

pub struct JoinGroupHandler;

#[async_trait]
impl MessageHandler<NodeState> for JoinGroupHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let uid = require_user(require_session(session)?)?;
        let request: GroupRequest = parse(body)?;

        let group = load_group(state, request.groupid).await?;
        state.users().join_group(group.id, uid).await?;

        let name = match state.users().get_user_info(uid).await? {
            Some(user) => user.display_name().to_string(),
            None => String::new(),
        };
        let notify = json!({ "groupid": group.id, "uid": uid, "name": name });
        notify_local_members(state, group.id, uid, MsgId::NotifyJoinGroup, &notify).await?;

        Ok(Reply::Body(json!({ "groupid": group.id, "name": group.name })))
    }
}

pub struct QuitGroupHandler;

#[async_trait]
impl MessageHandler<NodeState> for QuitGroupHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let uid = require_user(require_session(session)?)?;
        let request: GroupRequest = parse(body)?;

        load_group(state, request.groupid).await?;
        state.users().quit_group(request.groupid, uid).await?;

        let notify = json!({ "groupid": request.groupid, "uid": uid });
        notify_local_members(state, request.groupid, uid, MsgId::NotifyQuitGroup, &notify).await?;

        Ok(Reply::Body(json!({ "groupid": request.groupid })))
    }
}

/// Route one copy of a group message to every other member
///
/// Returns the server id shared by the copies.
async fn fan_out(state: &NodeState, uid: UserId, request: &GroupTextRequest) -> HandlerResult<u64> {
    load_group(state, request.groupid).await?;
    let members = state.users().get_group_members(request.groupid).await?;
    if !members.contains(&uid) {
        return Err(DomainError::NotMember.into());
    }

    let template = ChatMessage::direct(
        state.ids().generate(),
        uid,
        0,
        request.msgid,
        request.content.clone(),
    );

    let mut stored = 0usize;
    for member in members.into_iter().filter(|m| *m != uid) {
        let copy = template.for_group_member(request.groupid, member);
        if route_message(state, copy).await? == Routed::Stored {
            stored += 1;
        }
    }

    tracing::debug!(
        user_id = uid,
        group_id = request.groupid,
        server_msgid = template.id,
        stored,
        "Group message routed"
    );
    Ok(template.id)
}

/// Fan a text message out to every other member
pub struct GroupTextHandler;

#[async_trait]
impl MessageHandler<NodeState> for GroupTextHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let uid = require_user(require_session(session)?)?;
        let request: GroupTextRequest = parse(body)?;

        if !first_sighting(state, uid, request.msgid).await? {
            return Ok(Reply::Body(json!({
                "error": ErrorCode::RepeatMessage,
                "msgid": request.msgid,
                "groupid": request.groupid,
            })));
        }

        let server_msgid = match fan_out(state, uid, &request).await {
            Ok(server_msgid) => server_msgid,
            Err(e) => {
                forget_sighting(state, uid, request.msgid).await;
                return Err(e);
            }
        };

        Ok(Reply::Body(json!({
            "msgid": request.msgid,
            "server_msgid": server_msgid,
            "groupid": request.groupid,
        })))
    }
}

pub struct GroupMembersHandler;

#[async_trait]
impl MessageHandler<NodeState> for GroupMembersHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        require_user(require_session(session)?)?;
        let request: GroupRequest = parse(body)?;

        let group = load_group(state, request.groupid).await?;
        let members = state.users().get_group_members(group.id).await?;

        Ok(Reply::Body(json!({
            "groupid": group.id,
            "name": group.name,
            "owner": group.owner_uid,
            "members": members,
        })))
    }
}
