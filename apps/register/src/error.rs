//! # API Error Type
//!
//! Unified error type for register commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Register                           │
//! │                                                                         │
//! │  Console / CLI                 Commands                                 │
//! │  ─────────────                 ────────                                 │
//! │                                                                         │
//! │  scan "6291041500213"                                                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │  CoreError::NotFound ─────────────┐                              │  │
//! │  │  DbError::Query ──────────────────┤                              │  │
//! │  │  SyncError::HttpStatus ───────────┼──► ApiError { code, message }│  │
//! │  │  FinalizeError::RemoteFailure ────┘                              │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  The console prints `message` as an alert and keeps the session open.  │
//! │  The CLI prints it to stderr and exits with status 1.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use d365pos_core::CoreError;
use d365pos_db::DbError;
use d365pos_sync::SyncError;

use crate::finalizer::FinalizeError;

/// Error returned from register commands.
///
/// ## Serialization
/// `--json` output of a failed command:
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "No product found for code '999'"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Operator-facing message
    pub message: String,
}

/// Error codes for command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Code, line or receipt not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Local database failed
    DatabaseError,

    /// Business rule rejected the operation
    BusinessLogic,

    /// Internal error
    Internal,

    /// An ERP call is in flight
    Busy,

    /// ERP call failed
    RemoteError,

    /// Missing or invalid configuration
    ConfigError,

    /// Tender rejected
    PaymentError,

    /// Basket operation failed
    BasketError,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn busy() -> Self {
        ApiError::new(
            ErrorCode::Busy,
            "Register is busy, wait for the current operation to finish",
        )
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate { constraint } => {
                tracing::error!(constraint, "Duplicate record rejected");
                ApiError::new(ErrorCode::DatabaseError, "Record already exists")
            }
            DbError::Connection(e) => {
                tracing::error!("Database unavailable: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database unavailable")
            }
            DbError::Migration(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::Query(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::InvalidData { column, value } => {
                tracing::error!(column, value, "Unreadable journal data");
                ApiError::new(ErrorCode::DatabaseError, "Stored data is unreadable")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound { .. } | CoreError::LineNotFound(_) => {
                ApiError::new(ErrorCode::NotFound, message)
            }
            CoreError::InvalidMask { .. } | CoreError::PriceNotFound { .. } => {
                ApiError::new(ErrorCode::BusinessLogic, message)
            }
            CoreError::LineVoided(_) | CoreError::BasketFull { .. } | CoreError::NoItems => {
                ApiError::new(ErrorCode::BasketError, message)
            }
            CoreError::InsufficientTender { .. } => ApiError::new(ErrorCode::PaymentError, message),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

/// Converts ERP and configuration errors to API errors.
impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        if err.is_config_error() {
            return ApiError::new(ErrorCode::ConfigError, err.to_string());
        }
        match err {
            SyncError::DatabaseError(e) => {
                tracing::error!("Database error during ERP operation: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            rejected @ SyncError::SignInRejected(_) => {
                ApiError::new(ErrorCode::BusinessLogic, rejected.to_string())
            }
            other => ApiError::new(ErrorCode::RemoteError, other.to_string()),
        }
    }
}

/// Converts finalizer errors to API errors.
impl From<FinalizeError> for ApiError {
    fn from(err: FinalizeError) -> Self {
        let message = err.to_string();
        match err {
            FinalizeError::NoItems => ApiError::new(ErrorCode::BasketError, message),
            FinalizeError::InsufficientTender { .. } => {
                ApiError::new(ErrorCode::PaymentError, message)
            }
            FinalizeError::StaleConfirmation => ApiError::new(ErrorCode::BusinessLogic, message),
            FinalizeError::Busy => ApiError::busy(),
            FinalizeError::RemoteFailure(_) => ApiError::new(ErrorCode::RemoteError, message),
            FinalizeError::LocalPersistFailure { .. } | FinalizeError::Journal(_) => {
                ApiError::new(ErrorCode::DatabaseError, message)
            }
            FinalizeError::Core(e) => e.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
