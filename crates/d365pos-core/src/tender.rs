//! # Tender & Confirmation
//!
//! First phase of the two-phase finalize: validate the tender against the
//! basket and compute what the operator confirms.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  compute_confirmation(basket, method, tendered)                        │
//! │       │                                                                 │
//! │       ├── no active lines ─────────────────► NoItems                   │
//! │       ├── cash, tendered < total ──────────► InsufficientTender        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ConfirmationDetails { total, tendered, change, … }                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  operator confirms ──► commit (register app) ──► remote + journal      │
//! │  operator cancels  ──► nothing happens                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::round_amount;
use crate::basket::{Basket, BasketLine, BasketTotals};
use crate::error::{CoreError, CoreResult};
use crate::types::{PaymentMethod, TransactionType};
use crate::validation::validate_tendered;

/// What the operator sees before committing a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationDetails {
    pub method: PaymentMethod,
    pub transaction_type: TransactionType,
    pub totals: BasketTotals,

    /// Amount due (Σ line gross).
    pub total: Decimal,
    pub tendered: Decimal,
    pub change: Decimal,

    /// Every basket line, void ones included, as it was when confirmed.
    pub lines: Vec<ConfirmedLine>,
}

/// Line snapshot taken at confirmation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedLine {
    pub line_num: u32,
    pub item_id: String,
    pub unit_id: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub price_includes_tax: bool,
    pub is_void: bool,
}

impl From<&BasketLine> for ConfirmedLine {
    fn from(line: &BasketLine) -> Self {
        ConfirmedLine {
            line_num: line.line_num,
            item_id: line.item_id.clone(),
            unit_id: line.unit_id.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            price_includes_tax: line.price_includes_tax,
            is_void: line.is_void,
        }
    }
}

impl ConfirmationDetails {
    /// True when the basket still holds exactly the lines and totals this
    /// confirmation was computed from.
    pub fn matches_basket(&self, basket: &Basket) -> bool {
        basket.totals() == self.totals
            && basket.lines().len() == self.lines.len()
            && basket
                .lines()
                .iter()
                .zip(&self.lines)
                .all(|(line, confirmed)| ConfirmedLine::from(line) == *confirmed)
    }
}

/// Validates the tender and computes change.
///
/// ## Rules
/// - Card always tenders exactly the total
/// - Cash with no tendered amount is treated as exact cash
/// - Cash below the total is rejected
/// - A refund (total below zero) is paid out exactly, no change
pub fn compute_confirmation(
    basket: &Basket,
    method: PaymentMethod,
    tendered: Option<Decimal>,
) -> CoreResult<ConfirmationDetails> {
    if basket.is_empty() {
        return Err(CoreError::NoItems);
    }

    let totals = basket.totals();
    let total = totals.gross;

    let tendered = match (method, tendered) {
        (PaymentMethod::Card, _) | (PaymentMethod::Cash, None) => total,
        _ if total <= Decimal::ZERO => total,
        (PaymentMethod::Cash, Some(amount)) => {
            validate_tendered(amount)?;
            let amount = round_amount(amount);
            if amount < total {
                return Err(CoreError::InsufficientTender {
                    tendered: amount,
                    due: total,
                });
            }
            amount
        }
    };

    Ok(ConfirmationDetails {
        method,
        transaction_type: basket.transaction_type(),
        totals,
        total,
        tendered,
        change: round_amount(tendered - total),
        lines: basket.lines().iter().map(ConfirmedLine::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::types::{Product, UnitPrice};

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn basket_with(qty: &str) -> Basket {
        let product = Product {
            item_id: "A".to_string(),
            unit_id: "EA".to_string(),
            barcode: "111".to_string(),
            description: "Water 1.5L".to_string(),
            description_ar: None,
            plu_code: None,
            tax_group: "VAT".to_string(),
            tax_factor: d("0.05"),
        };
        let catalog = Catalog::new(
            vec![product.clone()],
            vec![UnitPrice {
                item_id: "A".to_string(),
                unit_id: "EA".to_string(),
                unit_price: d("10.00"),
                price_include_tax: Decimal::ZERO,
            }],
            vec![],
        );
        let mut basket = Basket::new();
        basket
            .add_or_increment(&product, "EA", d(qty), &catalog)
            .unwrap();
        basket
    }

    #[test]
    fn test_cash_change() {
        let basket = basket_with("2");
        let details = compute_confirmation(&basket, PaymentMethod::Cash, Some(d("50"))).unwrap();
        assert_eq!(details.total, d("21.000"));
        assert_eq!(details.tendered, d("50.000"));
        assert_eq!(details.change, d("29.000"));
        assert!(details.matches_basket(&basket));
    }

    #[test]
    fn test_cash_below_total_rejected() {
        let basket = basket_with("2");
        let err = compute_confirmation(&basket, PaymentMethod::Cash, Some(d("20.999"))).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientTender { .. }));
    }

    #[test]
    fn test_card_tenders_exact_total() {
        let basket = basket_with("1");
        let details = compute_confirmation(&basket, PaymentMethod::Card, Some(d("999"))).unwrap();
        assert_eq!(details.tendered, details.total);
        assert_eq!(details.change, Decimal::ZERO);
    }

    #[test]
    fn test_refund_pays_out_exactly() {
        let basket = basket_with("-1");
        let details = compute_confirmation(&basket, PaymentMethod::Cash, Some(d("0"))).unwrap();
        assert_eq!(details.total, d("-10.500"));
        assert_eq!(details.change, Decimal::ZERO);
        assert_eq!(details.transaction_type, TransactionType::Return);
    }

    #[test]
    fn test_swapped_line_with_same_totals_is_stale() {
        let product = |item_id: &str| Product {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            barcode: format!("{}-BC", item_id),
            description: item_id.to_string(),
            description_ar: None,
            plu_code: None,
            tax_group: "VAT".to_string(),
            tax_factor: d("0.05"),
        };
        let price = |item_id: &str| UnitPrice {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            unit_price: d("10.00"),
            price_include_tax: Decimal::ZERO,
        };
        let (a, c) = (product("A"), product("C"));
        let catalog = Catalog::new(vec![a.clone(), c.clone()], vec![price("A"), price("C")], vec![]);

        let mut basket = Basket::new();
        basket.add_or_increment(&a, "EA", d("1"), &catalog).unwrap();
        let details = compute_confirmation(&basket, PaymentMethod::Card, None).unwrap();
        assert_eq!(details.lines.len(), 1);

        basket.void_line(1).unwrap();
        basket.add_or_increment(&c, "EA", d("1"), &catalog).unwrap();

        assert_eq!(basket.totals(), details.totals);
        assert!(!details.matches_basket(&basket));
    }

    #[test]
    fn test_empty_basket() {
        let basket = Basket::new();
        assert!(matches!(
            compute_confirmation(&basket, PaymentMethod::Cash, None),
            Err(CoreError::NoItems)
        ));
    }
}
