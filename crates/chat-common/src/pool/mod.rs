//! Generic blocking-checkout connection pool
//!
//! One implementation serves PostgreSQL, Redis and peer-node connections; each
//! backend only supplies a [`Connector`].

mod connection_pool;

pub use connection_pool::{ConnectionPool, Connector, PoolConfig, PoolError, PooledConnection};
