//! # Amount Module
//!
//! Rounding and formatting rules for every monetary value in the register.
//!
//! ## Why Decimal?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WEIGHED ITEMS BREAK INTEGER CENTS                                      │
//! │                                                                         │
//! │  Barcode 2112345003299 encodes a total of 32.99 for an item priced     │
//! │  10.997 per KG. Quantity = 32.99 / 10.997 = 2.99990906...              │
//! │                                                                         │
//! │  The ERP works in 3 decimal places. We keep quantities exact and       │
//! │  round AMOUNTS once per line, then sum the rounded values.             │
//! │                                                                         │
//! │    line amounts ──round(3)──► Σ lines ──► order totals                 │
//! │                                                                         │
//! │  Never round the sum instead of the lines: penny-level results differ. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use d365pos_core::amount::{format_amount, round_amount};
//! use rust_decimal::Decimal;
//!
//! let tax = round_amount(Decimal::new(9_523_809, 7)); // 0.9523809
//! assert_eq!(format_amount(tax), "0.952");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::ValidationError;

/// Decimal places used for every amount exchanged with the ERP.
pub const AMOUNT_SCALE: u32 = 3;

/// Rounds an amount to [`AMOUNT_SCALE`] places, half away from zero.
///
/// The result always carries exactly three decimal places so that stored
/// text and ERP payloads are stable ("21.000", not "21").
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(AMOUNT_SCALE);
    rounded
}

/// Formats an amount with exactly three decimals ("N3").
pub fn format_amount(value: Decimal) -> String {
    round_amount(value).to_string()
}

/// Sums already-rounded amounts.
pub fn sum_amounts<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let total: Decimal = amounts.into_iter().sum();
    round_amount(total)
}

/// Parses operator or storage text into an amount.
///
/// ## Rules
/// - Leading/trailing whitespace is ignored
/// - Must be a plain decimal number ("12.5", "-3")
pub fn parse_amount(field: &str, text: &str) -> Result<Decimal, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Decimal::from_str(text).map_err(|e| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
