//! Heartbeat handler (1003)
//!
//! Clients and peer connection pools both ping with 1003. The read loop has
//! already recorded the activity; the handler only answers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::server::NodeState;

use super::HandlerResult;

/// Handles heartbeat requests
pub struct HeartbeatHandler;

#[async_trait]
impl MessageHandler<NodeState> for HeartbeatHandler {
    async fn handle(
        &self,
        _state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        _body: Value,
    ) -> HandlerResult<Reply> {
        if let Some(session) = session {
            tracing::trace!(session_id = %session.id(), user_id = session.user_id(), "Heartbeat received");
        }
        Ok(Reply::Body(json!({})))
    }
}
