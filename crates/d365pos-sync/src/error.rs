//! # Sync Error Types
//!
//! Error types for ERP calls and catalog sync.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  HttpStatus             │ │
//! │  │  MissingSetting │  │  Timeout        │  │  Deserialization        │ │
//! │  │  InvalidUrl     │  │  AuthFailed     │  │  InvalidRecord          │ │
//! │  │                 │  │                 │  │  SignInRejected         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │    Database     │  local catalog replace failed                     │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is retried automatically; `is_retryable()` only tells the operator
//! whether pressing the button again is worth it.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid ERP configuration: {0}")]
    InvalidConfig(String),

    /// A required ERP setting is empty.
    #[error("ERP setting '{0}' is not configured")]
    MissingSetting(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Token endpoint refused the client credentials or answered garbage.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// ERP answered with a non-2xx status.
    #[error("ERP returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// A record in an ERP response cannot be mapped to a catalog row.
    #[error("Invalid {entity} record '{id}': {reason}")]
    InvalidRecord {
        entity: String,
        id: String,
        reason: String,
    },

    /// `getUser`/`getStore` answered but did not yield a company and store.
    /// Carries the ERP's message for the operator.
    #[error("Sign-in rejected: {0}")]
    SignInRejected(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<d365pos_db::DbError> for SyncError {
    fn from(err: d365pos_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::HttpStatus {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::DeserializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// True when a manual retry may succeed.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - ERP 5xx and 429 answers
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// True when the operator has to fix the configuration first.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingSetting(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::AuthFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Timeout("30s".into()).is_retryable());
        assert!(SyncError::HttpStatus {
            status: 503,
            body: String::new()
        }
        .is_retryable());

        assert!(!SyncError::HttpStatus {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!SyncError::MissingSetting("company".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::AuthFailed("bad secret".into()).is_config_error());
        assert!(!SyncError::Timeout("15s".into()).is_config_error());

        let rejected = SyncError::SignInRejected("Invalid password".into());
        assert!(!rejected.is_config_error());
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::InvalidRecord {
            entity: "BarcodeMask".into(),
            id: "M1".into(),
            reason: "prefix 'AB' is not a number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid BarcodeMask record 'M1': prefix 'AB' is not a number"
        );
    }
}
