//! TCP peer router
//!
//! One connection pool per peer node, opened on first use. Each request
//! checks a connection out, sends one frame and waits for the matching
//! response; connections that fail or time out are discarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;

use chat_common::pool::{ConnectionPool, PoolConfig};
use chat_common::{PeersConfig, PoolSettings};
use chat_core::{
    AddFriendNotify, AuthFriendNotify, ChatMessage, DomainError, KickUserRequest, PeerReply,
    PeerRouter, RepoResult, UserId,
};

use crate::protocol::{Frame, MsgId, PeerRoute};

use super::connector::{exchange, PeerConnector};

type PeerPool = ConnectionPool<PeerConnector>;

/// Routes requests to peer nodes by name
pub struct TcpPeerRouter {
    addresses: RwLock<HashMap<String, String>>,
    pools: Mutex<HashMap<String, Arc<PeerPool>>>,
    pool_config: PoolConfig,
    request_timeout: Duration,
    max_body_length: usize,
}

impl TcpPeerRouter {
    pub fn new(peers: &PeersConfig, pool: &PoolSettings, max_body_length: usize) -> Self {
        let addresses = peers
            .nodes
            .iter()
            .map(|node| (node.name.clone(), node.address.clone()))
            .collect();

        Self {
            addresses: RwLock::new(addresses),
            pools: Mutex::new(HashMap::new()),
            pool_config: PoolConfig {
                size: peers.pool_size.max(1),
                health_check_interval: pool.health_check_interval,
                probe_timeout: pool.probe_timeout,
            },
            request_timeout: peers.request_timeout,
            max_body_length,
        }
    }

    /// Register or replace a peer address
    ///
    /// An existing pool to the old address is kept until it is closed.
    pub fn add_peer(&self, name: impl Into<String>, address: impl Into<String>) {
        let name = name.into();
        let address = address.into();
        tracing::info!(peer = %name, address = %address, "Peer registered");
        self.addresses.write().insert(name, address);
    }

    pub fn knows(&self, name: &str) -> bool {
        self.addresses.read().contains_key(name)
    }

    /// Close every pool
    pub async fn close(&self) {
        let pools: Vec<_> = self.pools.lock().await.drain().map(|(_, pool)| pool).collect();
        for pool in pools {
            pool.close().await;
        }
    }

    async fn pool_for(&self, node: &str) -> RepoResult<Arc<PeerPool>> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(node) {
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
        }

        let address = self
            .addresses
            .read()
            .get(node)
            .cloned()
            .ok_or_else(|| DomainError::PeerUnavailable(node.to_string()))?;

        let connector = PeerConnector::new(node, address, self.max_body_length);
        let pool = ConnectionPool::connect(connector, self.pool_config.clone())
            .await
            .map_err(|e| DomainError::PeerUnavailable(format!("{node}: {e}")))?;

        let pool = Arc::new(pool);
        pools.insert(node.to_string(), pool.clone());
        Ok(pool)
    }

    async fn request<T: Serialize + Sync>(
        &self,
        node: &str,
        request_id: MsgId,
        response_id: MsgId,
        body: &T,
        from_uid: UserId,
    ) -> RepoResult<PeerReply> {
        let frame = Frame::json(request_id, body)
            .map_err(|e| DomainError::RpcFailed(e.to_string()))?
            .with_route(Some(PeerRoute {
                from_uid,
                device_id: 0,
            }));

        // One deadline covers both checkout and the exchange
        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let pool = match tokio::time::timeout_at(deadline, self.pool_for(node)).await {
            Ok(pool) => pool?,
            Err(_) => {
                return Err(DomainError::PeerUnavailable(format!(
                    "{node}: connect timed out"
                )))
            }
        };
        let mut conn = match tokio::time::timeout_at(deadline, pool.get_connection()).await {
            Ok(Some(conn)) => conn,
            Ok(None) => return Err(DomainError::PoolClosed),
            Err(_) => {
                return Err(DomainError::RpcFailed(format!(
                    "{node}: no connection available"
                )))
            }
        };

        let response = match tokio::time::timeout_at(
            deadline,
            exchange(&mut conn, frame, response_id.as_u32()),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                conn.discard();
                return Err(DomainError::RpcFailed(format!("{node}: {e}")));
            }
            Err(_) => {
                conn.discard();
                return Err(DomainError::RpcFailed(format!("{node}: request timed out")));
            }
        };
        drop(conn);

        let body = response
            .body_json()
            .map_err(|e| DomainError::RpcFailed(e.to_string()))?;
        let reply: PeerReply =
            serde_json::from_value(body).map_err(|e| DomainError::RpcFailed(e.to_string()))?;

        tracing::debug!(peer = %node, msg_id = %request_id, error = reply.error, "Peer request completed");
        Ok(reply)
    }
}

impl std::fmt::Debug for TcpPeerRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpPeerRouter")
            .field("peers", &self.addresses.read().len())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl PeerRouter for TcpPeerRouter {
    async fn forward_text_message(
        &self,
        node: &str,
        message: &ChatMessage,
    ) -> RepoResult<PeerReply> {
        self.request(
            node,
            MsgId::PeerTextReq,
            MsgId::PeerTextRsp,
            message,
            message.from_uid,
        )
        .await
    }

    async fn forward_notify_add_friend(
        &self,
        node: &str,
        notify: &AddFriendNotify,
    ) -> RepoResult<PeerReply> {
        self.request(
            node,
            MsgId::PeerAddFriendReq,
            MsgId::PeerAddFriendRsp,
            notify,
            notify.applyuid,
        )
        .await
    }

    async fn forward_notify_auth_friend(
        &self,
        node: &str,
        notify: &AuthFriendNotify,
    ) -> RepoResult<PeerReply> {
        self.request(
            node,
            MsgId::PeerAuthFriendReq,
            MsgId::PeerAuthFriendRsp,
            notify,
            notify.fromuid,
        )
        .await
    }

    async fn forward_kick_user(
        &self,
        node: &str,
        request: &KickUserRequest,
    ) -> RepoResult<PeerReply> {
        self.request(
            node,
            MsgId::PeerKickReq,
            MsgId::PeerKickRsp,
            request,
            request.uid,
        )
        .await
    }
}
