use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// `unique_violation` in the Postgres error-code table.
const UNIQUE_VIOLATION: &str = "23505";

// Path relative to crates/pagevault-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &pagevault_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Validation(#[from] pagevault_core::ValidationError),
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(#[source] sqlx::Error),
    #[error("deadline exceeded before the store call completed")]
    DeadlineExceeded,
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        let unique_violation = matches!(
            &error,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
        );
        if unique_violation {
            Self::Conflict(error)
        } else {
            Self::Sqlx(error)
        }
    }
}

/// The four outcomes a caller needs to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; retrying will not help.
    Validation,
    NotFound,
    /// Uniqueness violation at write time.
    Conflict,
    /// Connectivity, timeout, or other backend failure; safe to retry with backoff.
    Storage,
}

impl DbError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::DeadlineExceeded | Self::Sqlx(_) | Self::Migration(_) => ErrorKind::Storage,
        }
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Opens a read-only transaction at `REPEATABLE READ` so that multi-statement
/// reads (a page plus its total, a rollup of several aggregates) all see the
/// same snapshot of the store.
async fn begin_read(pool: &PgPool) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn error_kinds_collapse_variants() {
        assert_eq!(
            DbError::from(pagevault_core::ValidationError::NoProducts).kind(),
            ErrorKind::Validation
        );
        assert_eq!(DbError::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(DbError::DeadlineExceeded.kind(), ErrorKind::Storage);
        assert_eq!(
            DbError::from(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn non_database_sqlx_errors_are_not_conflicts() {
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::Sqlx(sqlx::Error::RowNotFound)
        ));
    }
}

mod deadline;
pub mod ingest;
pub mod products;
pub mod snapshots;
pub mod statistics;
mod store;

pub use deadline::Deadline;
pub use ingest::{delete_snapshot, ingest_snapshot};
pub use products::{get_product_by_id, get_product_by_url, search_products, ProductRow};
pub use snapshots::{
    get_history, get_latest_snapshot, get_latest_snapshots, get_snapshot_by_id, PageSnapshotRow,
};
pub use statistics::{get_global_statistics, get_url_statistics};
pub use store::Store;
