//! # chat-db
//!
//! PostgreSQL implementations of the `UserStore` and `MessageStore` traits
//! defined in `chat-core`, running on the shared `ConnectionPool`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chat_db::{create_pool, ensure_schema, PgUserStore};
//!
//! async fn example(config: &chat_common::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let db = config.database.as_ref().ok_or("no database configured")?;
//!     let pool = Arc::new(create_pool(db, &config.pool).await?);
//!     if let Some(mut conn) = pool.get_connection().await {
//!         ensure_schema(&mut conn).await?;
//!     }
//!     let users = PgUserStore::new(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod schema;

// Re-export commonly used types
pub use pool::{create_pool, PgConnectionPool, PgConnector, PgPooledConnection};
pub use repositories::{PgMessageStore, PgUserStore};
pub use schema::ensure_schema;
