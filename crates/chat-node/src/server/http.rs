//! Health and stats endpoints

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::NodeState;

/// Snapshot returned by `GET /stats`
#[derive(Debug, Serialize)]
pub struct NodeStats {
    pub node: String,
    pub sessions: usize,
    pub online_users: usize,
    pub pending_deliveries: usize,
}

impl NodeStats {
    pub fn collect(state: &NodeState) -> Self {
        Self {
            node: state.node_name().to_string(),
            sessions: state.sessions().count(),
            online_users: state.presence().online_count(),
            pending_deliveries: state.delivery().pending_count(),
        }
    }
}

/// Create the HTTP router
pub fn create_router(state: NodeState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn stats(State(state): State<NodeState>) -> Json<NodeStats> {
    Json(NodeStats::collect(&state))
}

/// Serve until `shutdown` fires
pub(crate) async fn serve(listener: TcpListener, state: NodeState, shutdown: CancellationToken) {
    let app = create_router(state);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        tracing::error!(error = %e, "HTTP server failed");
    }
}
