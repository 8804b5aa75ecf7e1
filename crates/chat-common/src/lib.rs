//! # chat-common
//!
//! Shared infrastructure for the IM node: configuration, error handling,
//! telemetry, and the generic connection pool used by every outbound client.

pub mod config;
pub mod error;
pub mod pool;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, ClientProtocol, ConfigError, DatabaseConfig, DeliveryConfig,
    Environment, NodeConfig, PeerNode, PeersConfig, PoolSettings, ProtocolConfig, RedisConfig,
    SessionConfig,
};
pub use error::{AppError, AppResult};
pub use pool::{ConnectionPool, Connector, PoolConfig, PoolError, PooledConnection};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
