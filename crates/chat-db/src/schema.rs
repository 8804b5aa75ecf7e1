//! Schema bootstrap

use sqlx::PgConnection;

const INIT_SQL: &str = include_str!("../migrations/0001_init.sql");

/// Create every table the stores use. Safe to run on every start.
pub async fn ensure_schema(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(INIT_SQL).execute(conn).await?;
    Ok(())
}
