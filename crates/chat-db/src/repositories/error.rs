//! SQLx error mapping

use chat_core::error::DomainError;
use sqlx::Error as SqlxError;

pub(super) fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Map a unique-key violation to `conflict`; anything else is a database error
pub(super) fn map_unique_violation(
    e: SqlxError,
    conflict: impl FnOnce() -> DomainError,
) -> DomainError {
    let unique = e
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());
    if unique {
        conflict()
    } else {
        map_db_error(e)
    }
}
