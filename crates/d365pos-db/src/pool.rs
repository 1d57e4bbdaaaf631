//! # Register Database
//!
//! ```text
//! DbConfig::new(path) ──► Database::new ──► pool + migrations
//!                                 │
//!                                 ├──► catalog()       CatalogRepository
//!                                 └──► transactions()  TransactionRepository
//! ```
//!
//! WAL mode lets the journal view and catalog load read while a sale is
//! being written.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::transaction::TransactionRepository;

/// One register process: a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the register keeps its SQLite file.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

impl DbConfig {
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: MAX_CONNECTIONS,
        }
    }

    /// Private in-memory database (tests). A second connection would see
    /// a different, empty database, so the pool holds exactly one.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the catalog snapshot and the journal. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool (WAL, NORMAL sync, foreign keys on) and applies
    /// pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening register database");

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::Connection(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        debug!(max_connections = config.max_connections, "Database pool created");

        migrations::run_migrations(&pool).await?;
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the catalog repository (products, prices, masks).
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Returns the transaction journal repository.
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    /// Closes the pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let counts = db.catalog().counts().await.unwrap();
        assert_eq!(counts.products, 0);
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_database_reports_connection_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        let err = db.transactions().count().await.unwrap_err();
        assert!(matches!(err, DbError::Connection(_)));
    }

    #[test]
    fn test_file_config_uses_default_pool_size() {
        let config = DbConfig::new("/tmp/register.db");
        assert_eq!(config.max_connections, MAX_CONNECTIONS);
        assert_eq!(DbConfig::in_memory().max_connections, 1);
    }
}
