//! # Storage Errors
//!
//! ```text
//! sqlx::Error / MigrateError
//!       │
//!       ▼
//!   DbError ──► SyncError::DatabaseError          (catalog replace)
//!           └─► FinalizeError::LocalPersistFailure (journal insert)
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The database file could not be opened, or the pool is closed or
    /// timed out.
    #[error("Database unavailable: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A UNIQUE constraint rejected the write: a receipt id already in the
    /// journal, or the same key twice in one catalog batch.
    #[error("Duplicate record ({constraint})")]
    Duplicate { constraint: String },

    #[error("Query failed: {0}")]
    Query(String),

    /// A stored value could not be read back, e.g. a decimal column that
    /// does not hold a number.
    #[error("Invalid {column} value '{value}'")]
    InvalidData { column: String, value: String },
}

impl DbError {
    pub fn invalid_data(column: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::InvalidData {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                // SQLite: "UNIQUE constraint failed: <table>.<column>"
                match msg.strip_prefix("UNIQUE constraint failed: ") {
                    Some(constraint) => DbError::Duplicate {
                        constraint: constraint.to_string(),
                    },
                    None => DbError::Query(msg.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DbError::Connection(err.to_string())
            }
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
