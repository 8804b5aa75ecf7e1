//! PostgreSQL connections for the generic pool

use async_trait::async_trait;
use sqlx::{Connection, PgConnection};

use chat_common::pool::{ConnectionPool, Connector, PoolConfig, PoolError, PooledConnection};
use chat_common::{DatabaseConfig, PoolSettings};

/// Pool of PostgreSQL connections
pub type PgConnectionPool = ConnectionPool<PgConnector>;

/// A checked-out PostgreSQL connection
pub type PgPooledConnection = PooledConnection<PgConnector>;

/// Opens `PgConnection`s to one database URL
#[derive(Debug, Clone)]
pub struct PgConnector {
    url: String,
}

impl PgConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = PgConnection;

    fn target(&self) -> String {
        // Credentials stay out of logs
        match self.url.rsplit_once('@') {
            Some((_, host)) => format!("postgres://{host}"),
            None => self.url.clone(),
        }
    }

    async fn connect(&self) -> Result<PgConnection, PoolError> {
        PgConnection::connect(&self.url)
            .await
            .map_err(|e| PoolError::Connect {
                target: self.target(),
                reason: e.to_string(),
            })
    }

    async fn ping(&self, conn: &mut PgConnection) -> Result<(), PoolError> {
        sqlx::query("SELECT 1")
            .execute(conn)
            .await
            .map(|_| ())
            .map_err(|e| PoolError::HealthCheck(e.to_string()))
    }
}

/// Open a PostgreSQL pool sized from configuration
pub async fn create_pool(
    config: &DatabaseConfig,
    settings: &PoolSettings,
) -> Result<PgConnectionPool, PoolError> {
    ConnectionPool::connect(
        PgConnector::new(&config.url),
        PoolConfig {
            size: config.pool_size,
            health_check_interval: settings.health_check_interval,
            probe_timeout: settings.probe_timeout,
        },
    )
    .await
}
