//! Database connection pool management

mod postgres;

pub use postgres::{create_pool, PgConnectionPool, PgConnector, PgPooledConnection};
