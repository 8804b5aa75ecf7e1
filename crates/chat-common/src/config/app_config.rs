//! Node configuration
//!
//! Loaded from environment variables (and a `.env` file when present). Every
//! field has a default so a bare `chat-node` starts a single in-memory node.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main node configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub node: NodeConfig,
    pub protocol: ProtocolConfig,
    pub session: SessionConfig,
    pub delivery: DeliveryConfig,
    /// `None` keeps users and offline messages in memory
    pub database: Option<DatabaseConfig>,
    /// `None` keeps presence and dedup keys in memory
    pub redis: Option<RedisConfig>,
    pub pool: PoolSettings,
    pub peers: PeersConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

/// Identity and listen addresses of this node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Name recorded in the presence store for users served here
    pub name: String,
    pub host: String,
    /// Client listener (client protocol variant)
    pub port: u16,
    /// Peer listener (peer protocol variant)
    pub peer_port: u16,
    /// Health and stats endpoints
    pub http_port: u16,
}

impl NodeConfig {
    #[must_use]
    pub fn client_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn peer_address(&self) -> String {
        format!("{}:{}", self.host, self.peer_port)
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            host: default_host(),
            port: 8090,
            peer_port: 8091,
            http_port: 8092,
        }
    }
}

/// Header layout spoken by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientProtocol {
    /// u32 id, u32 length
    #[default]
    Standard,
    /// u16 id, u16 length
    Compact,
}

impl FromStr for ClientProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown protocol `{other}`")),
        }
    }
}

/// Wire protocol limits
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub max_body_length: usize,
    pub client_protocol: ClientProtocol,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_body_length: default_max_body_length(),
            client_protocol: ClientProtocol::default(),
        }
    }
}

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frames queued beyond this are dropped
    pub send_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: default_send_queue_capacity(),
        }
    }
}

/// Reliable delivery timing
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub ack_timeout: Duration,
    pub max_retries: u32,
    pub dedup_ttl: Duration,
    /// Idle time before an authenticated session is probed with a heartbeat
    pub heartbeat_probe_interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(5_000),
            max_retries: 3,
            dedup_ttl: Duration::from_secs(10),
            heartbeat_probe_interval: Duration::from_secs(60),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: usize,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
}

/// Settings shared by every connection pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub health_check_interval: Duration,
    /// Upper bound on one connect or liveness probe
    pub probe_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// A named peer node reachable over the peer protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerNode {
    pub name: String,
    pub address: String,
}

/// Peer routing configuration
#[derive(Debug, Clone)]
pub struct PeersConfig {
    pub nodes: Vec<PeerNode>,
    pub pool_size: usize,
    pub request_timeout: Duration,
}

impl PeersConfig {
    pub fn address_of(&self, name: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .map(|n| n.address.as_str())
    }
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            pool_size: 4,
            request_timeout: Duration::from_millis(3_000),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-node".to_string()
}

fn default_node_name() -> String {
    "node-1".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_body_length() -> usize {
    65_536
}

fn default_send_queue_capacity() -> usize {
    1_000
}

fn default_database_pool_size() -> usize {
    8
}

fn default_redis_pool_size() -> usize {
    8
}

/// Parse `name=host:port,name=host:port`
pub fn parse_peer_nodes(value: &str) -> Result<Vec<PeerNode>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, address) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidValue("PEER_NODES", entry.to_string()))?;
            let (name, address) = (name.trim(), address.trim());
            if name.is_empty() || !address.contains(':') {
                return Err(ConfigError::InvalidValue("PEER_NODES", entry.to_string()));
            }
            Ok(PeerNode {
                name: name.to_string(),
                address: address.to_string(),
            })
        })
        .collect()
}

/// Read and parse a variable, falling back to `default` when unset
fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default),
    }
}

fn millis_or(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    var_or(name, default.as_millis() as u64).map(Duration::from_millis)
}

fn secs_or(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    var_or(name, default.as_secs()).map(Duration::from_secs)
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let env = match env::var("APP_ENV") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("APP_ENV", raw))?,
            Err(_) => Environment::default(),
        };
        let client_protocol = match env::var("CLIENT_PROTOCOL") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CLIENT_PROTOCOL", raw))?,
            Err(_) => ClientProtocol::default(),
        };

        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Some(DatabaseConfig {
                url,
                pool_size: var_or("DATABASE_POOL_SIZE", default_database_pool_size())?,
            }),
            _ => None,
        };
        let redis = match env::var("REDIS_URL") {
            Ok(url) if !url.is_empty() => Some(RedisConfig {
                url,
                pool_size: var_or("REDIS_POOL_SIZE", default_redis_pool_size())?,
            }),
            _ => None,
        };

        let peer_nodes = match env::var("PEER_NODES") {
            Ok(raw) => parse_peer_nodes(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env,
            },
            node: NodeConfig {
                name: env::var("NODE_NAME").unwrap_or_else(|_| default_node_name()),
                host: env::var("NODE_HOST").unwrap_or_else(|_| default_host()),
                port: var_or("NODE_PORT", defaults.node.port)?,
                peer_port: var_or("NODE_PEER_PORT", defaults.node.peer_port)?,
                http_port: var_or("NODE_HTTP_PORT", defaults.node.http_port)?,
            },
            protocol: ProtocolConfig {
                max_body_length: var_or("MAX_BODY_LENGTH", default_max_body_length())?,
                client_protocol,
            },
            session: SessionConfig {
                send_queue_capacity: var_or(
                    "SEND_QUEUE_CAPACITY",
                    default_send_queue_capacity(),
                )?,
            },
            delivery: DeliveryConfig {
                ack_timeout: millis_or("ACK_TIMEOUT_MS", defaults.delivery.ack_timeout)?,
                max_retries: var_or("MAX_RETRIES", defaults.delivery.max_retries)?,
                dedup_ttl: secs_or("DEDUP_TTL_SECS", defaults.delivery.dedup_ttl)?,
                heartbeat_probe_interval: secs_or(
                    "HEARTBEAT_PROBE_INTERVAL_SECS",
                    defaults.delivery.heartbeat_probe_interval,
                )?,
            },
            database,
            redis,
            pool: PoolSettings {
                health_check_interval: secs_or(
                    "POOL_HEALTH_CHECK_INTERVAL_SECS",
                    defaults.pool.health_check_interval,
                )?,
                probe_timeout: millis_or("POOL_PROBE_TIMEOUT_MS", defaults.pool.probe_timeout)?,
            },
            peers: PeersConfig {
                nodes: peer_nodes,
                pool_size: var_or("PEER_POOL_SIZE", defaults.peers.pool_size)?,
                request_timeout: millis_or(
                    "PEER_REQUEST_TIMEOUT_MS",
                    defaults.peers.request_timeout,
                )?,
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
