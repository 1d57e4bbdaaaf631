//! # Validation Module
//!
//! Input validation for operator-entered values.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Register front end                                            │
//! │  └── Parses text into numbers, trims scanner noise                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (business rule validation)                       │
//! │  ├── Codes non-empty and bounded                                       │
//! │  └── Quantities non-zero and bounded                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / FOREIGN KEY constraints                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use d365pos_core::validation::{validate_code, validate_quantity};
//! use rust_decimal::Decimal;
//!
//! assert_eq!(validate_code(" 6281000000017\n").unwrap(), "6281000000017");
//! assert!(validate_quantity(Decimal::ZERO).is_err());
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::{MAX_CODE_LENGTH, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a scanned or typed code.
///
/// ## Returns
/// The trimmed code.
pub fn validate_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    Ok(code.to_string())
}

/// Validates a product search query. Empty is allowed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an operator-entered quantity (set-quantity correction).
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: Decimal) -> ValidationResult<()> {
    if qty <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    validate_quantity_limit(qty)
}

/// Validates a signed quantity added to the basket.
///
/// Returns carry negative quantities; only zero is rejected.
pub fn validate_line_quantity(qty: Decimal) -> ValidationResult<()> {
    if qty.is_zero() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    validate_quantity_limit(qty)
}

/// Rejects quantities whose magnitude exceeds MAX_LINE_QUANTITY.
pub fn validate_quantity_limit(qty: Decimal) -> ValidationResult<()> {
    if qty.abs() > MAX_LINE_QUANTITY {
        return Err(ValidationError::TooLarge {
            field: "quantity".to_string(),
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a cash amount handed over by the customer.
pub fn validate_tendered(amount: Decimal) -> ValidationResult<()> {
    if amount < Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "tendered".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert_eq!(validate_code("  ABC  ").unwrap(), "ABC");
        assert!(validate_code("   ").is_err());
        assert!(validate_code(&"9".repeat(MAX_CODE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(Decimal::new(25, 1)).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(Decimal::new(-1, 0)).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + Decimal::ONE).is_err());
    }

    #[test]
    fn test_validate_line_quantity_allows_returns() {
        assert!(validate_line_quantity(Decimal::new(-5, 0)).is_ok());
        assert!(validate_line_quantity(Decimal::ZERO).is_err());
        assert!(validate_line_quantity(-MAX_LINE_QUANTITY - Decimal::ONE).is_err());
    }

    #[test]
    fn test_validate_tendered() {
        assert!(validate_tendered(Decimal::ZERO).is_ok());
        assert!(validate_tendered(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  tea ").unwrap(), "tea");
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }
}
