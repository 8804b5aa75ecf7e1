//! Listener accept loops and session lifecycle hooks

use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::connection::{CloseReason, Session, SessionHandler, SessionOptions};
use crate::delivery::DeliveryKind;
use crate::dispatch::Dispatcher;
use crate::protocol::Frame;

use super::NodeState;

/// Feeds a session's frames to a dispatcher and cleans up after it
pub struct NodeSessionHandler {
    state: NodeState,
    dispatcher: Arc<Dispatcher>,
}

impl NodeSessionHandler {
    pub fn new(state: NodeState, dispatcher: Arc<Dispatcher>) -> Self {
        Self { state, dispatcher }
    }
}

#[async_trait]
impl SessionHandler for NodeSessionHandler {
    fn on_frame(&self, session: &Arc<Session>, frame: Frame) {
        if !self.dispatcher.push(session.clone(), frame) {
            session.close();
        }
    }

    async fn on_closed(&self, session: &Arc<Session>, reason: CloseReason) {
        release_session(&self.state, session).await;
        tracing::info!(
            session_id = %session.id(),
            user_id = session.user_id(),
            reason = %reason,
            "Connection closed"
        );
    }
}

/// Forget a closed session everywhere the node recorded it
///
/// Unacknowledged chat messages are stored for the next login.
pub(crate) async fn release_session(state: &NodeState, session: &Arc<Session>) {
    state.sessions().remove(session.id());

    for failed in state.delivery().cancel_for_session(session.id()) {
        if let DeliveryKind::Message(message) = failed.kind {
            if let Err(e) = state.messages().save_offline_message(&message).await {
                tracing::warn!(
                    session_id = %session.id(),
                    server_msgid = message.id,
                    error = %e,
                    "Failed to store undelivered message"
                );
            }
        }
    }

    let uid = session.user_id();
    if uid == 0 || !state.presence().remove_session(uid, session.id()) {
        return;
    }
    match state
        .presence_store()
        .del_online_user_info_if(uid, state.node_name())
        .await
    {
        Ok(true) => tracing::debug!(user_id = uid, "Presence entry removed"),
        Ok(false) => {}
        Err(e) => tracing::warn!(user_id = uid, error = %e, "Failed to clear presence entry"),
    }
}

/// Accept connections until `shutdown` fires
pub(crate) async fn accept_loop(
    listener: TcpListener,
    kind: &'static str,
    state: NodeState,
    options: SessionOptions,
    handler: Arc<dyn SessionHandler>,
    shutdown: CancellationToken,
) {
    loop {
        let (stream, remote_addr) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(listener = kind, error = %e, "Accept failed");
                    continue;
                }
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(listener = kind, error = %e, "Failed to set TCP_NODELAY");
        }

        let session = Session::new(stream, options, Some(remote_addr));
        state.sessions().add(session.clone());
        session.start(handler.clone());

        tracing::info!(
            listener = kind,
            session_id = %session.id(),
            remote_addr = %remote_addr,
            "Connection accepted"
        );
    }
    tracing::debug!(listener = kind, "Listener stopped");
}
