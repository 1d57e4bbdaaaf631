//! # Tax Engine
//!
//! Per-line tax, net and gross amounts under the two ERP pricing regimes.
//!
//! ## Regimes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total = quantity × unit_price        f = product tax factor            │
//! │                                                                         │
//! │  INCLUSIVE (price already contains tax)                                 │
//! │    net   = round(total / (1 + f), 3)                                   │
//! │    gross = round(total, 3)                                             │
//! │    tax   = gross − net                                                 │
//! │                                                                         │
//! │  EXCLUSIVE (tax added on top)                                          │
//! │    tax   = round(total × f, 3)                                         │
//! │    net   = round(total, 3)                                             │
//! │    gross = round(total + tax, 3)                                       │
//! │                                                                         │
//! │  Both regimes guarantee gross == net + tax for every line.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order totals are never computed here directly: the basket sums the
//! rounded line amounts (see [`crate::basket`]).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::round_amount;

/// Which pricing regime applies to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    Inclusive,
    Exclusive,
}

impl TaxRegime {
    pub fn from_flag(price_includes_tax: bool) -> Self {
        if price_includes_tax {
            TaxRegime::Inclusive
        } else {
            TaxRegime::Exclusive
        }
    }
}

/// Rounded amounts of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub net: Decimal,
    pub tax: Decimal,
    pub gross: Decimal,
}

impl LineAmounts {
    /// All-zero amounts (void journal lines).
    pub fn zero() -> Self {
        LineAmounts {
            net: round_amount(Decimal::ZERO),
            tax: round_amount(Decimal::ZERO),
            gross: round_amount(Decimal::ZERO),
        }
    }
}

/// Stateless tax calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxEngine;

impl TaxEngine {
    /// Computes the amounts of one line.
    ///
    /// ## Example
    /// ```rust
    /// use d365pos_core::tax::{TaxEngine, TaxRegime};
    /// use rust_decimal::Decimal;
    ///
    /// // 1 × 20.00 incl. 5% VAT
    /// let amounts = TaxEngine::compute_line(
    ///     Decimal::ONE,
    ///     Decimal::new(2000, 2),
    ///     Decimal::new(5, 2),
    ///     TaxRegime::Inclusive,
    /// );
    /// assert_eq!(amounts.net.to_string(), "19.048");
    /// assert_eq!(amounts.tax.to_string(), "0.952");
    /// assert_eq!(amounts.gross.to_string(), "20.000");
    /// ```
    pub fn compute_line(
        quantity: Decimal,
        unit_price: Decimal,
        tax_factor: Decimal,
        regime: TaxRegime,
    ) -> LineAmounts {
        let total = quantity * unit_price;

        match regime {
            TaxRegime::Inclusive => {
                let divisor = Decimal::ONE + tax_factor;
                // A factor of -100% would divide by zero; treat it as untaxed.
                let net_exact = total.checked_div(divisor).unwrap_or(total);
                let net = round_amount(net_exact);
                let gross = round_amount(total);
                LineAmounts {
                    net,
                    tax: gross - net,
                    gross,
                }
            }
            TaxRegime::Exclusive => {
                let tax = round_amount(total * tax_factor);
                let net = round_amount(total);
                LineAmounts {
                    net,
                    tax,
                    gross: round_amount(total + tax),
                }
            }
        }
    }
}
