//! # Repository Module
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Catalog sync / register session                                       │
//! │       │                                                                 │
//! │       │  db.catalog().replace_products(&rows)                          │
//! │       │  db.transactions().insert(&finalized)                          │
//! │       ▼                                                                 │
//! │  CatalogRepository          TransactionRepository                      │
//! │  ├── replace_products       ├── insert                                 │
//! │  ├── replace_prices         ├── get_transaction / find_by_receipt      │
//! │  ├── replace_masks          ├── lines / payments / taxes               │
//! │  └── load_catalog           └── list_recent / next_receipt_sequence    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

pub mod catalog;
pub mod transaction;

/// Reads a TEXT decimal column.
pub(crate) fn decimal_column(column: &str, value: &str) -> DbResult<Decimal> {
    Decimal::from_str(value.trim()).map_err(|_| DbError::invalid_data(column, value))
}

/// Reads a non-negative INTEGER column into a narrower unsigned type.
pub(crate) fn unsigned_column<T: TryFrom<i64>>(column: &str, value: i64) -> DbResult<T> {
    T::try_from(value).map_err(|_| DbError::invalid_data(column, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_column() {
        assert_eq!(decimal_column("total", "12.500").unwrap(), Decimal::new(12_500, 3));
        assert!(matches!(
            decimal_column("total", "abc"),
            Err(DbError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_unsigned_column() {
        let value: u32 = unsigned_column("prefix", 21).unwrap();
        assert_eq!(value, 21);
        assert!(unsigned_column::<u32>("prefix", -1).is_err());
    }
}
