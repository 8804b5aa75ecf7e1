//! User search (1007)

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use chat_core::{DomainError, UserId};

use crate::connection::Session;
use crate::dispatch::{MessageHandler, Reply};
use crate::handlers::routing::{locate, Location};
use crate::server::NodeState;

use super::{parse, require_session, require_user, to_object, HandlerError, HandlerResult};

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    uid: Option<UserId>,
    #[serde(default)]
    name: Option<String>,
}

/// Look a user up by id or by name
pub struct SearchUserHandler;

#[async_trait]
impl MessageHandler<NodeState> for SearchUserHandler {
    async fn handle(
        &self,
        state: &NodeState,
        session: Option<&Arc<Session>>,
        _msg_id: u32,
        body: Value,
    ) -> HandlerResult<Reply> {
        require_user(require_session(session)?)?;
        let request: SearchRequest = parse(body)?;

        let user = match (request.uid, request.name.as_deref()) {
            (Some(uid), _) if uid != 0 => state
                .users()
                .get_user_info(uid)
                .await?
                .ok_or(DomainError::UserNotFound(uid))?,
            (_, Some(name)) if !name.is_empty() => state
                .users()
                .get_user(name)
                .await?
                .ok_or_else(|| HandlerError::InvalidParams(format!("no user named {name}")))?,
            _ => {
                return Err(HandlerError::InvalidParams(
                    "uid or name is required".to_string(),
                ))
            }
        };

        let online = !matches!(locate(state, user.uid).await, Location::Offline);
        let mut body = to_object(&user)?;
        body.insert("online".to_string(), Value::Bool(online));
        Ok(Reply::Body(Value::Object(body)))
    }
}
