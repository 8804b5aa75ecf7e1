//! User presence storage in Redis.
//!
//! `uip_{uid}` holds the name of the node serving the user.
//! `msgid_{uid}_{msgid}` marks a client message id as seen for a short window.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError};
use tracing::{instrument, warn};

use chat_core::error::DomainError;
use chat_core::traits::{PresenceStore, RepoResult};
use chat_core::value_objects::UserId;

use crate::pool::{RedisPool, RedisPooledConnection};

/// Key prefix for the node serving a user
const ONLINE_PREFIX: &str = "uip_";
/// Key prefix for seen client message ids
const MSG_ID_PREFIX: &str = "msgid_";

/// Delete the key only while it still holds ARGV[1]
const DEL_IF_EQUALS: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

fn online_key(uid: UserId) -> String {
    format!("{ONLINE_PREFIX}{uid}")
}

fn msg_id_key(uid: UserId, msg_id: u64) -> String {
    format!("{MSG_ID_PREFIX}{uid}_{msg_id}")
}

/// Whole seconds, at least one (Redis rejects `EX 0`)
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Map a command error, dropping the connection if it is broken
fn command_failed(conn: RedisPooledConnection, e: RedisError) -> DomainError {
    if e.is_io_error() || e.is_connection_dropped() {
        warn!(error = %e, "Discarding broken Redis connection");
        conn.discard();
    }
    DomainError::CacheError(e.to_string())
}

/// `PresenceStore` backed by Redis
#[derive(Clone)]
pub struct RedisPresenceStore {
    pool: Arc<RedisPool>,
}

impl RedisPresenceStore {
    pub fn new(pool: Arc<RedisPool>) -> Self {
        Self { pool }
    }

    async fn acquire(&self) -> RepoResult<RedisPooledConnection> {
        self.pool
            .get_connection()
            .await
            .ok_or(DomainError::PoolClosed)
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    #[instrument(skip(self))]
    async fn set_online_user_info(&self, uid: UserId, node: &str) -> RepoResult<()> {
        let mut conn = self.acquire().await?;
        let result: Result<(), RedisError> = conn.set(online_key(uid), node).await;
        result.map_err(|e| command_failed(conn, e))
    }

    #[instrument(skip(self))]
    async fn get_online_user_info(&self, uid: UserId) -> RepoResult<Option<String>> {
        let mut conn = self.acquire().await?;
        let result: Result<Option<String>, RedisError> = conn.get(online_key(uid)).await;
        result.map_err(|e| command_failed(conn, e))
    }

    #[instrument(skip(self))]
    async fn del_online_user_info(&self, uid: UserId) -> RepoResult<()> {
        let mut conn = self.acquire().await?;
        let result: Result<i64, RedisError> = conn.del(online_key(uid)).await;
        result.map(|_| ()).map_err(|e| command_failed(conn, e))
    }

    #[instrument(skip(self))]
    async fn del_online_user_info_if(&self, uid: UserId, node: &str) -> RepoResult<bool> {
        let mut conn = self.acquire().await?;
        let result: Result<i64, RedisError> = redis::Script::new(DEL_IF_EQUALS)
            .key(online_key(uid))
            .arg(node)
            .invoke_async(&mut *conn)
            .await;
        result.map(|n| n > 0).map_err(|e| command_failed(conn, e))
    }

    #[instrument(skip(self))]
    async fn set_user_msg_id(&self, uid: UserId, msg_id: u64, ttl: Duration) -> RepoResult<bool> {
        let mut conn = self.acquire().await?;
        let result: Result<Option<String>, RedisError> = redis::cmd("SET")
            .arg(msg_id_key(uid, msg_id))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut *conn)
            .await;
        result
            .map(|reply| reply.is_some())
            .map_err(|e| command_failed(conn, e))
    }

    #[instrument(skip(self))]
    async fn get_user_msg_id(&self, uid: UserId, msg_id: u64) -> RepoResult<bool> {
        let mut conn = self.acquire().await?;
        let result: Result<bool, RedisError> = conn.exists(msg_id_key(uid, msg_id)).await;
        result.map_err(|e| command_failed(conn, e))
    }

    #[instrument(skip(self))]
    async fn expire_user_msg_id(
        &self,
        uid: UserId,
        msg_id: u64,
        ttl: Duration,
    ) -> RepoResult<bool> {
        let secs = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);
        let mut conn = self.acquire().await?;
        let result: Result<bool, RedisError> = conn.expire(msg_id_key(uid, msg_id), secs).await;
        result.map_err(|e| command_failed(conn, e))
    }

    #[instrument(skip(self))]
    async fn del_user_msg_id(&self, uid: UserId, msg_id: u64) -> RepoResult<bool> {
        let mut conn = self.acquire().await?;
        let result: Result<i64, RedisError> = conn.del(msg_id_key(uid, msg_id)).await;
        result.map(|n| n > 0).map_err(|e| command_failed(conn, e))
    }
}
