//! `PostgreSQL` store implementations for the helpdesk.
//!
//! Every store trait from `helpdesk-core` has a `Postgres*Store` here. Stores hold a
//! cloned [`PgPool`] and use runtime-checked `sqlx::query` calls, so the crate builds
//! without a live database.
//!
//! Writes that touch several rows (permission matrices, postmaster filters, generic
//! agent updates, the ticket number counter) run inside one transaction.
//!
//! # Example
//!
//! ```ignore
//! use helpdesk_postgres::{PostgresGroupStore, connect, migrate};
//! use std::time::Duration;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/helpdesk", 10, 2, Duration::from_secs(30)).await?;
//!     migrate(&pool).await?;
//!     let groups = PostgresGroupStore::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use helpdesk_core::StoreError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use thiserror::Error;

mod api_tokens;
mod counter;
mod dynamic_fields;
mod generic_agent;
mod groups;
mod permissions;
mod postmaster;
mod tickets;

pub use api_tokens::PostgresApiTokenStore;
pub use counter::PostgresCounterStore;
pub use dynamic_fields::PostgresDynamicFieldStore;
pub use generic_agent::PostgresGenericAgentStore;
pub use groups::PostgresGroupStore;
pub use permissions::PostgresPermissionStore;
pub use postmaster::PostgresPostmasterFilterStore;
pub use tickets::PostgresTicketStore;

/// Errors from pool setup and schema migration.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The pool could not connect.
    #[error("Database connection failed: {0}")]
    Connect(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`SetupError::Connect`] if the database cannot be reached within
/// `acquire_timeout`.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, SetupError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections.min(max_connections))
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the bundled schema migrations.
///
/// # Errors
///
/// Returns [`SetupError::Migrate`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), SetupError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

/// Round-trip a trivial query, for readiness checks.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Map a sqlx error onto [`StoreError`].
///
/// Unique and foreign key violations become [`StoreError::Conflict`].
pub(crate) fn db_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        match db.code().as_deref() {
            Some("23505") => return StoreError::Conflict(db.message().to_string()),
            Some("23503") => {
                return StoreError::Conflict(format!("still referenced: {}", db.message()));
            }
            _ => {}
        }
    }
    StoreError::Database(e.to_string())
}

/// OTRS-style `0/1` smallint flag.
pub(crate) const fn flag(value: bool) -> i16 {
    if value { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = db_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_flag() {
        assert_eq!(flag(true), 1);
        assert_eq!(flag(false), 0);
    }
}
