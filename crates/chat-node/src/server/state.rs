//! Node state
//!
//! Shared dependencies for handlers, listeners and background tasks.

use std::sync::Arc;

use chat_cache::{RedisPool, RedisPresenceStore};
use chat_common::{AppConfig, AppError, AppResult};
use chat_core::{IdGenerator, MessageStore, PeerRouter, PresenceStore, UserStore};
use chat_db::{PgConnectionPool, PgMessageStore, PgUserStore};

use crate::connection::{SessionManager, SessionOptions};
use crate::delivery::DeliveryEngine;
use crate::presence::PresenceRegistry;
use crate::protocol::ProtocolVariant;

/// Storage collaborators of a node
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub messages: Arc<dyn MessageStore>,
    pub presence: Arc<dyn PresenceStore>,
}

impl Stores {
    /// In-memory stores, private to this node
    pub fn memory() -> Self {
        Self {
            users: Arc::new(chat_core::MemoryUserStore::new()),
            messages: Arc::new(chat_core::MemoryMessageStore::new()),
            presence: Arc::new(chat_core::MemoryPresenceStore::new()),
        }
    }

    /// Stores selected by configuration
    ///
    /// PostgreSQL backs users and messages when `database` is set, Redis
    /// backs presence when `redis` is set; anything unset is in-memory.
    pub async fn connect(config: &AppConfig) -> AppResult<(Self, StorePools)> {
        let mut stores = Self::memory();
        let mut pools = StorePools::default();

        if let Some(database) = &config.database {
            tracing::info!("Connecting to PostgreSQL...");
            let pool = Arc::new(chat_db::create_pool(database, &config.pool).await?);
            {
                let mut conn = pool
                    .get_connection()
                    .await
                    .ok_or(chat_core::DomainError::PoolClosed)?;
                chat_db::ensure_schema(&mut conn)
                    .await
                    .map_err(AppError::internal)?;
            }
            stores.users = Arc::new(PgUserStore::new(pool.clone()));
            stores.messages = Arc::new(PgMessageStore::new(pool.clone()));
            pools.postgres = Some(pool);
            tracing::info!("PostgreSQL stores ready");
        }

        if let Some(redis) = &config.redis {
            tracing::info!("Connecting to Redis...");
            let pool = Arc::new(chat_cache::create_pool(redis, &config.pool).await?);
            stores.presence = Arc::new(RedisPresenceStore::new(pool.clone()));
            pools.redis = Some(pool);
            tracing::info!("Redis presence store ready");
        }

        Ok((stores, pools))
    }
}

/// Pools opened by [`Stores::connect`], closed on shutdown
#[derive(Default)]
pub struct StorePools {
    postgres: Option<Arc<PgConnectionPool>>,
    redis: Option<Arc<RedisPool>>,
}

impl StorePools {
    pub async fn close(&self) {
        if let Some(pool) = &self.postgres {
            pool.close().await;
        }
        if let Some(pool) = &self.redis {
            pool.close().await;
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Node application state
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct NodeState {
    config: Arc<AppConfig>,
    sessions: Arc<SessionManager>,
    presence: Arc<PresenceRegistry>,
    delivery: Arc<DeliveryEngine>,
    stores: Stores,
    peers: Arc<dyn PeerRouter>,
    ids: Arc<IdGenerator>,
}

impl NodeState {
    pub fn new(
        config: AppConfig,
        stores: Stores,
        peers: Arc<dyn PeerRouter>,
        delivery: Arc<DeliveryEngine>,
    ) -> Self {
        let ids = Arc::new(IdGenerator::for_node(&config.node.name));
        Self {
            config: Arc::new(config),
            sessions: SessionManager::new_shared(),
            presence: Arc::new(PresenceRegistry::new()),
            delivery,
            stores,
            peers,
            ids,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Name this node registers in the presence store
    pub fn node_name(&self) -> &str {
        &self.config.node.name
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn delivery(&self) -> &Arc<DeliveryEngine> {
        &self.delivery
    }

    pub fn users(&self) -> &dyn UserStore {
        self.stores.users.as_ref()
    }

    pub fn messages(&self) -> &dyn MessageStore {
        self.stores.messages.as_ref()
    }

    pub fn presence_store(&self) -> &dyn PresenceStore {
        self.stores.presence.as_ref()
    }

    pub fn peers(&self) -> &dyn PeerRouter {
        self.peers.as_ref()
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Session settings for client connections
    pub fn client_session_options(&self) -> SessionOptions {
        SessionOptions {
            variant: self.config.protocol.client_protocol.into(),
            max_body_length: self.config.protocol.max_body_length,
            send_queue_capacity: self.config.session.send_queue_capacity,
        }
    }

    /// Session settings for inbound peer connections
    pub fn peer_session_options(&self) -> SessionOptions {
        SessionOptions {
            variant: ProtocolVariant::Peer,
            max_body_length: self.config.protocol.max_body_length,
            send_queue_capacity: self.config.session.send_queue_capacity,
        }
    }
}

impl std::fmt::Debug for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeState")
            .field("node", &self.config.node.name)
            .field("sessions", &self.sessions)
            .field("presence", &self.presence)
            .field("config", &"AppConfig")
            .finish()
    }
}
