//! Peer request to drop a user's session (0xf007)

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use chat_core::KickUserRequest;

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::protocol::MsgId;
use crate::server::NodeState;

use super::{parse, HandlerResult};

/// Another node accepted a login for a user connected here
///
/// The presence store already names the new node, so only the local
/// session is released.
pub struct PeerKickHandler;

#[async_trait]
impl MessageHandler<NodeState> for PeerKickHandler {
    async fn handle(
        &self,
        state: &NodeState,
        _session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let request: KickUserRequest = parse(body)?;

        let Some(target) = state.presence().get_session(request.uid) else {
            return Ok(Reply::Body(json!({ "kicked": false })));
        };

        state.presence().remove_session(request.uid, target.id());
        target.send_json(
            MsgId::NotifyOffline,
            &json!({ "error": 0, "uid": request.uid, "reason": "relogin" }),
        );
        target.close();

        tracing::info!(session_id = %target.id(), user_id = request.uid, "Session kicked by peer node");
        Ok(Reply::Body(json!({ "kicked": true })))
    }
}
