//! One-to-one text chat (1020) and its peer-forwarded form (0xf001)

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use chat_core::{ChatMessage, UserId};

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::protocol::ErrorCode;
use crate::server::NodeState;

use super::routing::{deliver_local, route_message};
use super::{parse, require_session, require_user, HandlerError, HandlerResult};

#[derive(Debug, Deserialize)]
struct TextChatRequest {
    touid: UserId,
    /// Client-chosen id, used for duplicate suppression
    msgid: u64,
    content: String,
}

/// Record `(uid, msgid)`; `false` means it was seen within the dedup window
pub(super) async fn first_sighting(
    state: &NodeState,
    uid: UserId,
    msgid: u64,
) -> HandlerResult<bool> {
    let ttl = state.config().delivery.dedup_ttl;
    Ok(state.presence_store().set_user_msg_id(uid, msgid, ttl).await?)
}

/// Undo [`first_sighting`] after a failure so the sender's retry is
/// processed instead of being answered as a repeat
pub(super) async fn forget_sighting(state: &NodeState, uid: UserId, msgid: u64) {
    if let Err(e) = state.presence_store().del_user_msg_id(uid, msgid).await {
        tracing::warn!(user_id = uid, msgid, error = %e, "Failed to release dedup key");
    }
}

/// Send a text message to another user
///
/// The response only confirms the node accepted the message.
pub struct TextChatHandler;

#[async_trait]
impl MessageHandler<NodeState> for TextChatHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let uid = require_user(require_session(session)?)?;
        let request: TextChatRequest = parse(body)?;
        if request.touid == 0 {
            return Err(HandlerError::InvalidParams("touid must be non-zero".to_string()));
        }

        if !first_sighting(state, uid, request.msgid).await? {
            tracing::debug!(user_id = uid, msgid = request.msgid, "Duplicate text message dropped");
            return Ok(Reply::Body(json!({
                "error": ErrorCode::RepeatMessage,
                "msgid": request.msgid,
                "touid": request.touid,
            })));
        }

        let message = ChatMessage::direct(
            state.ids().generate(),
            uid,
            request.touid,
            request.msgid,
            request.content,
        );
        let server_msgid = message.id;
        let routed = match route_message(state, message).await {
            Ok(routed) => routed,
            Err(e) => {
                forget_sighting(state, uid, request.msgid).await;
                return Err(e);
            }
        };
        tracing::debug!(user_id = uid, touid = request.touid, server_msgid, ?routed, "Text message routed");

        Ok(Reply::Body(json!({
            "msgid": request.msgid,
            "server_msgid": server_msgid,
            "touid": request.touid,
        })))
    }
}

/// Text message forwarded by the sender's node
///
/// Never forwards again: a recipient that is not local is stored offline.
pub struct PeerTextHandler;

#[async_trait]
impl MessageHandler<NodeState> for PeerTextHandler {
    async fn handle(
        &self,
        state: &NodeState,
        _session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let message: ChatMessage = parse(body)?;

        match state.presence().get_session(message.to_uid) {
            Some(target) => {
                deliver_local(state, &target, message)?;
            }
            None => {
                tracing::debug!(user_id = message.to_uid, "Forwarded message target not here, storing offline");
                state.messages().save_offline_message(&message).await?;
            }
        }
        Ok(Reply::Body(json!({})))
    }
}
