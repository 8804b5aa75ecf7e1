//! Redis connection pool module.
//!
//! Redis connections managed by the shared `ConnectionPool`.

mod redis_pool;

pub use redis_pool::{create_pool, RedisConnector, RedisPool, RedisPooledConnection};
