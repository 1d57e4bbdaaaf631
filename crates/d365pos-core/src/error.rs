//! # Error Types
//!
//! Domain-specific error types for d365pos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  d365pos-core errors (this file)                                       │
//! │  ├── CoreError        - Resolution / basket / tender failures          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  d365pos-db errors      → DbError                                      │
//! │  d365pos-sync errors    → SyncError                                    │
//! │  register app           → FinalizeError, ApiError (what the operator   │
//! │                           sees)                                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → Operator alert         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, line, amounts)
//! 3. Errors are enum variants, never String
//! 4. Every variant leaves the basket unchanged

use rust_decimal::Decimal;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// None of these are fatal: they are recovered at the operation boundary and
/// shown to the operator as an informational alert.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Scanned code matched no product barcode, item id, mask or PLU.
    #[error("No product found for code '{code}'")]
    NotFound { code: String },

    /// A barcode mask matched the code but carries no Product segment.
    ///
    /// ## When This Occurs
    /// - ERP mask configured with only Price/Quantity segments
    /// - Segment rows missing from the last catalog sync
    #[error("Barcode mask {mask_id} has no Product segment")]
    InvalidMask { mask_id: String },

    /// No unit price exists for the (item, unit) pair.
    #[error("No price for item {item_id} in unit {unit_id}")]
    PriceNotFound { item_id: String, unit_id: String },

    /// Basket line number does not exist.
    #[error("Basket line {0} not found")]
    LineNotFound(u32),

    /// Operation requires an active (non-void) line.
    #[error("Basket line {0} is void")]
    LineVoided(u32),

    /// Basket already holds the maximum number of lines.
    #[error("Basket cannot have more than {max} lines")]
    BasketFull { max: usize },

    /// Finalize was requested with no active lines.
    #[error("Basket has no items")]
    NoItems,

    /// Cash tendered is below the amount due.
    ///
    /// ## User Workflow
    /// ```text
    /// Total due: 21.000
    ///      │
    ///      ▼
    /// Cashier enters 20.000
    ///      │
    ///      ▼
    /// InsufficientTender { tendered: 20.000, due: 21.000 }
    ///      │
    ///      ▼
    /// Confirmation step is never shown
    /// ```
    #[error("Tendered {tendered} is less than amount due {due}")]
    InsufficientTender { tendered: Decimal, due: Decimal },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value exceeds its limit.
    #[error("{field} must not exceed {max}")]
    TooLarge { field: String, max: Decimal },

    /// Invalid format (e.g., amount text that is not a number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientTender {
            tendered: Decimal::new(20_000, 3),
            due: Decimal::new(21_000, 3),
        };
        assert_eq!(
            err.to_string(),
            "Tendered 20.000 is less than amount due 21.000"
        );

        let err = CoreError::NotFound {
            code: "999".to_string(),
        };
        assert_eq!(err.to_string(), "No product found for code '999'");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
