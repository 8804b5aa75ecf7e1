//! Delivery acknowledgements (0xff33)

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::server::NodeState;

use super::{parse, require_session, HandlerResult};

#[derive(Debug, Deserialize)]
struct AckRequest {
    seq: u64,
}

/// Confirms receipt of a reliable frame
///
/// Unknown or foreign sequence numbers are answered with `acked: false`
/// rather than an error; a late ACK after a retry is normal.
pub struct AckHandler;

#[async_trait]
impl MessageHandler<NodeState> for AckHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        let session = require_session(session)?;
        let request: AckRequest = parse(body)?;

        let acked = state.delivery().ack(session.id(), request.seq);
        if !acked {
            tracing::debug!(session_id = %session.id(), seq = request.seq, "ACK for unknown seq");
        }
        Ok(Reply::Body(json!({ "seq": request.seq, "acked": acked })))
    }
}
