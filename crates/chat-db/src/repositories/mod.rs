//! Store implementations
//!
//! PostgreSQL implementations of the store traits defined in chat-core. Every
//! call checks one connection out of the pool for its duration.

mod error;
mod message;
mod user;

pub use message::PgMessageStore;
pub use user::PgUserStore;

use std::sync::Arc;

use chat_core::error::DomainError;
use chat_core::traits::RepoResult;

use crate::pool::{PgConnectionPool, PgPooledConnection};

async fn acquire(pool: &Arc<PgConnectionPool>) -> RepoResult<PgPooledConnection> {
    pool.get_connection().await.ok_or(DomainError::PoolClosed)
}
