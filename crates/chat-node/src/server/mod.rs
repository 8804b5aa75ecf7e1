//! Node server setup
//!
//! Binds the client, peer and HTTP listeners, wires dispatchers to
//! sessions and runs the background tasks.

mod failover;
mod handler;
mod http;
mod prober;
mod state;

pub use handler::NodeSessionHandler;
pub use http::{create_router, NodeStats};
pub use state::{NodeState, StorePools, Stores};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chat_common::{AppConfig, AppResult};

use crate::delivery::DeliveryEngine;
use crate::dispatch::Dispatcher;
use crate::handlers::build_registry;
use crate::peer::TcpPeerRouter;

/// How long shutdown waits for closing sessions to finish their cleanup
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// A running node
pub struct Node {
    state: NodeState,
    client_addr: SocketAddr,
    peer_addr: SocketAddr,
    http_addr: SocketAddr,
    client_dispatcher: Arc<Dispatcher>,
    peer_dispatcher: Arc<Dispatcher>,
    router: Arc<TcpPeerRouter>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Bind every listener and start serving
    ///
    /// Port 0 binds an ephemeral port; the bound addresses are available
    /// from the accessors.
    pub async fn start(config: AppConfig, stores: Stores) -> AppResult<Self> {
        let client_listener = TcpListener::bind(config.node.client_address()).await?;
        let peer_listener = TcpListener::bind(config.node.peer_address()).await?;
        let http_listener = TcpListener::bind(config.node.http_address()).await?;

        let client_addr = client_listener.local_addr()?;
        let peer_addr = peer_listener.local_addr()?;
        let http_addr = http_listener.local_addr()?;

        let router = Arc::new(TcpPeerRouter::new(
            &config.peers,
            &config.pool,
            config.protocol.max_body_length,
        ));
        let (delivery, failed) = DeliveryEngine::new(&config.delivery);
        let probe_interval = config.delivery.heartbeat_probe_interval;

        let state = NodeState::new(config, stores, router.clone(), delivery);

        // Separate queues: a client handler waiting on a peer RPC must not
        // hold up requests arriving from that peer.
        let client_dispatcher = Arc::new(Dispatcher::start("client", state.clone(), build_registry()));
        let peer_dispatcher = Arc::new(Dispatcher::start("peer", state.clone(), build_registry()));

        let shutdown = CancellationToken::new();
        let mut tasks = Vec::with_capacity(5);

        tasks.push(tokio::spawn(handler::accept_loop(
            client_listener,
            "client",
            state.clone(),
            state.client_session_options(),
            Arc::new(NodeSessionHandler::new(state.clone(), client_dispatcher.clone())),
            shutdown.clone(),
        )));
        tasks.push(tokio::spawn(handler::accept_loop(
            peer_listener,
            "peer",
            state.clone(),
            state.peer_session_options(),
            Arc::new(NodeSessionHandler::new(state.clone(), peer_dispatcher.clone())),
            shutdown.clone(),
        )));
        tasks.push(tokio::spawn(http::serve(
            http_listener,
            state.clone(),
            shutdown.clone(),
        )));
        tasks.push(tokio::spawn(failover::run_failover(
            state.clone(),
            failed,
            shutdown.clone(),
        )));
        tasks.push(tokio::spawn(prober::run_prober(
            state.clone(),
            probe_interval,
            shutdown.clone(),
        )));

        tracing::info!(
            node = %state.node_name(),
            client = %client_addr,
            peer = %peer_addr,
            http = %http_addr,
            "Node started"
        );

        Ok(Self {
            state,
            client_addr,
            peer_addr,
            http_addr,
            client_dispatcher,
            peer_dispatcher,
            router,
            shutdown,
            tasks,
        })
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Make another node reachable by name
    pub fn register_peer(&self, name: impl Into<String>, address: impl Into<String>) {
        self.router.add_peer(name, address);
    }

    /// Stop accepting, drain both dispatchers, close every session and
    /// release peer connections
    pub async fn shutdown(self) {
        tracing::info!(node = %self.state.node_name(), "Node shutting down");
        self.shutdown.cancel();

        self.client_dispatcher.stop().await;
        self.peer_dispatcher.stop().await;

        self.state.sessions().close_all();
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while self.state.sessions().count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        self.state.delivery().shutdown();
        self.router.close().await;

        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Node task failed");
            }
        }
        tracing::info!("Node stopped");
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("state", &self.state)
            .field("client_addr", &self.client_addr)
            .field("peer_addr", &self.peer_addr)
            .field("http_addr", &self.http_addr)
            .finish_non_exhaustive()
    }
}

/// Run a node with configured stores until Ctrl-C
pub async fn run(config: AppConfig) -> AppResult<()> {
    let (stores, pools) = Stores::connect(&config).await?;
    let node = Node::start(config, stores).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    node.shutdown().await;
    pools.close().await;
    Ok(())
}
