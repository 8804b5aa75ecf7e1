//! # chat-cache
//!
//! Redis-backed `PresenceStore`: which node serves each user, and the short
//! lived keys that de-duplicate retransmitted client messages.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chat_cache::{create_pool, RedisPresenceStore};
//!
//! let pool = Arc::new(create_pool(&redis_config, &pool_settings).await?);
//! let presence = RedisPresenceStore::new(pool);
//! presence.set_online_user_info(42, "node-1").await?;
//! ```

pub mod pool;
pub mod presence;

pub use pool::{create_pool, RedisConnector, RedisPool, RedisPooledConnection};
pub use presence::RedisPresenceStore;
