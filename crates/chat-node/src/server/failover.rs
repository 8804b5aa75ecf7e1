//! Handling of abandoned deliveries
//!
//! A frame that exhausted its retries means the client stopped reading.
//! The session is treated as disconnected: deregistered and closed. Chat
//! messages are kept for the next login.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::delivery::{DeliveryKind, FailedDelivery};

use super::NodeState;

/// Consume failures until `shutdown` fires
pub(crate) async fn run_failover(
    state: NodeState,
    mut failed: mpsc::UnboundedReceiver<FailedDelivery>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            delivery = failed.recv() => match delivery {
                Some(delivery) => handle_failure(&state, delivery).await,
                None => break,
            },
        }
    }
    tracing::debug!("Failover task stopped");
}

pub(crate) async fn handle_failure(state: &NodeState, delivery: FailedDelivery) {
    let FailedDelivery {
        seq,
        session,
        target_uid,
        kind,
    } = delivery;

    if let DeliveryKind::Message(message) = &kind {
        if let Err(e) = state.messages().save_offline_message(message).await {
            tracing::warn!(
                user_id = target_uid,
                server_msgid = message.id,
                error = %e,
                "Failed to store undelivered message"
            );
        }
    }

    if state.presence().remove_session(target_uid, session.id()) {
        if let Err(e) = state
            .presence_store()
            .del_online_user_info_if(target_uid, state.node_name())
            .await
        {
            tracing::warn!(user_id = target_uid, error = %e, "Failed to clear presence entry");
        }
    }

    tracing::warn!(
        session_id = %session.id(),
        user_id = target_uid,
        seq,
        kind = match kind {
            DeliveryKind::Message(_) => "message",
            DeliveryKind::Notify => "notify",
            DeliveryKind::Heartbeat => "heartbeat",
        },
        "Client unresponsive, evicting session"
    );
    session.close();
}
