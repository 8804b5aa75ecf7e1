//! Presence prober
//!
//! Logged-in sessions that have been silent for the probe interval get a
//! reliable heartbeat. A client that never acknowledges it is evicted
//! through the normal delivery failure path.

use std::time::Duration;

use serde_json::Map;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::delivery::DeliveryKind;
use crate::protocol::MsgId;

use super::NodeState;

/// Probe idle sessions every `interval` until `shutdown` fires
pub(crate) async fn run_prober(state: NodeState, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let probed = probe_idle_sessions(&state, interval);
                if probed > 0 {
                    tracing::debug!(probed, "Presence probes sent");
                }
            }
        }
    }
}

/// Send a probe to every idle session without one outstanding
pub(crate) fn probe_idle_sessions(state: &NodeState, idle: Duration) -> usize {
    let mut probed = 0;
    for session in state.sessions().idle_authenticated(idle) {
        if state.delivery().has_pending_heartbeat(session.id()) {
            continue;
        }
        state.delivery().send_reliable(
            &session,
            session.user_id(),
            MsgId::HeartbeatReq,
            Map::new(),
            DeliveryKind::Heartbeat,
        );
        probed += 1;
    }
    probed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chat_common::AppConfig;
    use tokio::io::DuplexStream;

    use crate::connection::{CloseReason, Session, SessionHandler};
    use crate::delivery::DeliveryEngine;
    use crate::peer::TcpPeerRouter;
    use crate::protocol::Frame;
    use crate::server::Stores;

    struct Ignore;

    #[async_trait]
    impl SessionHandler for Ignore {
        fn on_frame(&self, _session: &Arc<Session>, _frame: Frame) {}
        async fn on_closed(&self, _session: &Arc<Session>, _reason: CloseReason) {}
    }

    fn state() -> NodeState {
        let config = AppConfig::default();
        let router = Arc::new(TcpPeerRouter::new(
            &config.peers,
            &config.pool,
            config.protocol.max_body_length,
        ));
        let (delivery, _failed) = DeliveryEngine::new(&config.delivery);
        NodeState::new(config, Stores::memory(), router, delivery)
    }

    fn logged_in(state: &NodeState, uid: u64) -> (Arc<Session>, DuplexStream) {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let session = Session::new(server, state.client_session_options(), None);
        session.set_user_id(uid);
        state.sessions().add(session.clone());
        session.start(Arc::new(Ignore));
        (session, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_idle_sessions_are_probed_once() {
        let state = state();
        let (idle, _idle_client) = logged_in(&state, 1);

        let interval = Duration::from_secs(60);
        assert_eq!(probe_idle_sessions(&state, interval), 0);

        tokio::time::advance(Duration::from_secs(61)).await;
        let (_fresh, _fresh_client) = logged_in(&state, 2);

        assert_eq!(probe_idle_sessions(&state, interval), 1);
        assert!(state.delivery().has_pending_heartbeat(idle.id()));

        // Outstanding probe is not duplicated
        assert_eq!(probe_idle_sessions(&state, interval), 0);

        state.delivery().shutdown();
    }
}
