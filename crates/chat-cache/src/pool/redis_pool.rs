//! Redis connections for the generic pool

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;

use chat_common::pool::{ConnectionPool, Connector, PoolConfig, PoolError, PooledConnection};
use chat_common::{PoolSettings, RedisConfig};

/// Pool of Redis connections
pub type RedisPool = ConnectionPool<RedisConnector>;

/// A checked-out Redis connection
pub type RedisPooledConnection = PooledConnection<RedisConnector>;

/// Opens multiplexed connections to one Redis server
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: Client,
    safe_url: String,
}

impl RedisConnector {
    pub fn new(url: &str) -> Result<Self, PoolError> {
        // Redact credentials from URL for logging
        let safe_url = url.split('@').next_back().unwrap_or(url).to_string();
        let client = Client::open(url).map_err(|e| PoolError::Connect {
            target: safe_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { client, safe_url })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = MultiplexedConnection;

    fn target(&self) -> String {
        self.safe_url.clone()
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PoolError::Connect {
                target: self.target(),
                reason: e.to_string(),
            })
    }

    async fn ping(&self, conn: &mut MultiplexedConnection) -> Result<(), PoolError> {
        let pong: String = redis::cmd("PING")
            .query_async(conn)
            .await
            .map_err(|e| PoolError::HealthCheck(e.to_string()))?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(PoolError::HealthCheck(format!("unexpected reply {pong}")))
        }
    }
}

/// Open a Redis pool sized from configuration
pub async fn create_pool(
    config: &RedisConfig,
    settings: &PoolSettings,
) -> Result<RedisPool, PoolError> {
    ConnectionPool::connect(
        RedisConnector::new(&config.url)?,
        PoolConfig {
            size: config.pool_size,
            health_check_interval: settings.health_check_interval,
            probe_timeout: settings.probe_timeout,
        },
    )
    .await
}
