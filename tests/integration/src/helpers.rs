//! Test helpers for integration tests
//!
//! Provides nodes on ephemeral ports with in-memory stores, plus HTTP
//! access to their health and stats endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chat_common::AppConfig;
use chat_core::{MemoryMessageStore, MemoryPresenceStore, MemoryUserStore};
use chat_node::{Node, Stores};
use reqwest::{Client, Response};

use crate::client::TestClient;

/// Configuration for a loopback node with ephemeral ports
pub fn test_config(name: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.node.name = name.to_string();
    config.node.host = "127.0.0.1".to_string();
    config.node.port = 0;
    config.node.peer_port = 0;
    config.node.http_port = 0;
    config.peers.pool_size = 1;
    config.peers.request_timeout = Duration::from_secs(2);
    config
}

/// Stores shared by several nodes, as a cluster shares its database and cache
pub fn shared_stores() -> Stores {
    Stores {
        users: Arc::new(MemoryUserStore::new()),
        messages: Arc::new(MemoryMessageStore::new()),
        presence: Arc::new(MemoryPresenceStore::new()),
    }
}

/// Test node instance that manages lifecycle
pub struct TestNode {
    pub node: Node,
    pub http: Client,
}

impl TestNode {
    /// Start a node with private in-memory stores
    pub async fn start(name: &str) -> Result<Self> {
        Self::start_with(test_config(name), Stores::memory()).await
    }

    /// Start a node with custom config and stores
    pub async fn start_with(config: AppConfig, stores: Stores) -> Result<Self> {
        let node = Node::start(config, stores).await?;
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { node, http })
    }

    /// Open a client connection
    pub async fn connect(&self) -> Result<TestClient> {
        TestClient::connect(self.node.client_addr()).await
    }

    /// Connect and log in, creating the user
    pub async fn login(&self, uid: u64, name: &str) -> Result<TestClient> {
        let mut client = self.connect().await?;
        let response = client.login(uid, name).await?;
        anyhow::ensure!(response["error"] == 0, "login failed: {response}");
        Ok(client)
    }

    /// Make `other` reachable from this node
    pub fn link(&self, other: &TestNode) {
        let name = other.node.state().node_name().to_string();
        self.node
            .register_peer(name, other.node.peer_addr().to_string());
    }

    /// Get base URL for the HTTP endpoints
    pub fn base_url(&self) -> String {
        format!("http://{}", self.node.http_addr())
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.http.get(&url).send().await?)
    }

    pub fn is_online(&self, uid: u64) -> bool {
        self.node.state().presence().is_online(uid)
    }

    pub async fn shutdown(self) {
        self.node.shutdown().await;
    }
}

/// Poll `check` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Helper to check if external stores are available
pub fn check_store_env() -> bool {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return false;
    }

    true
}
