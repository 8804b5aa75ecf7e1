//! Configuration structs

mod app_config;

pub use app_config::{
    parse_peer_nodes, AppConfig, AppSettings, ClientProtocol, ConfigError, DatabaseConfig,
    DeliveryConfig, Environment, NodeConfig, PeerNode, PeersConfig, PoolSettings,
    ProtocolConfig, RedisConfig, SessionConfig,
};
