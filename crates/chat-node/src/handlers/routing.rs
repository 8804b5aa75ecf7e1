//! Locating users and routing chat messages to them

use std::sync::Arc;

use chat_core::{ChatMessage, UserId};

use crate::connection::Session;
use crate::delivery::DeliveryKind;
use crate::protocol::MsgId;
use crate::server::NodeState;

use super::{to_object, HandlerResult};

/// Where a user can currently be reached
pub(crate) enum Location {
    /// Connected to this node
    Local(Arc<Session>),
    /// Connected to the named peer node
    Remote(String),
    Offline,
}

/// Find the session or node serving `uid`
pub(crate) async fn locate(state: &NodeState, uid: UserId) -> Location {
    if let Some(session) = state.presence().get_session(uid) {
        return Location::Local(session);
    }

    match state.presence_store().get_online_user_info(uid).await {
        Ok(Some(node)) if node != state.node_name() => Location::Remote(node),
        Ok(_) => Location::Offline,
        Err(e) => {
            tracing::warn!(user_id = uid, error = %e, "Presence lookup failed, treating user as offline");
            Location::Offline
        }
    }
}

/// Outcome of routing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Sent reliably to a local session with this `seq`
    Local(u64),
    /// Handed to the named peer node
    Forwarded(String),
    /// Stored until the recipient logs in
    Stored,
}

/// Send a message to a local session with retransmission
pub fn deliver_local(
    state: &NodeState,
    session: &Arc<Session>,
    message: ChatMessage,
) -> HandlerResult<u64> {
    let msg_id = if message.is_group() {
        MsgId::NotifyGroupText
    } else {
        MsgId::NotifyTextChat
    };
    let body = to_object(&message)?;
    let target = message.to_uid;

    Ok(state.delivery().send_reliable(
        session,
        target,
        msg_id,
        body,
        DeliveryKind::Message(message),
    ))
}

/// Deliver locally, forward to the recipient's node, or store offline
///
/// A failed forward falls back to offline storage.
pub async fn route_message(state: &NodeState, message: ChatMessage) -> HandlerResult<Routed> {
    match locate(state, message.to_uid).await {
        Location::Local(session) => {
            let seq = deliver_local(state, &session, message)?;
            return Ok(Routed::Local(seq));
        }
        Location::Remote(node) => match state.peers().forward_text_message(&node, &message).await {
            Ok(reply) if reply.is_success() => {
                tracing::debug!(user_id = message.to_uid, node = %node, "Message forwarded");
                return Ok(Routed::Forwarded(node));
            }
            Ok(reply) => {
                tracing::warn!(
                    user_id = message.to_uid,
                    node = %node,
                    error = reply.error,
                    "Peer rejected forwarded message, storing offline"
                );
            }
            Err(e) => {
                tracing::warn!(
                    user_id = message.to_uid,
                    node = %node,
                    error = %e,
                    "Forwarding failed, storing offline"
                );
            }
        },
        Location::Offline => {}
    }

    state.messages().save_offline_message(&message).await?;
    tracing::debug!(user_id = message.to_uid, server_msgid = message.id, "Message stored offline");
    Ok(Routed::Stored)
}
