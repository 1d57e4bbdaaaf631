//! # Journal Records
//!
//! Turns a confirmed basket into the immutable [`FinalizedTransaction`] that
//! is sent to the ERP and written to the local journal.
//!
//! ## Record Shapes
//! ```text
//! ┌──────────────┬───────────────────────┬──────────┬──────────────────────┐
//! │ Kind         │ Lines                 │ Payment  │ Tax                  │
//! ├──────────────┼───────────────────────┼──────────┼──────────────────────┤
//! │ Sale/Return/ │ every active line,    │ one      │ one aggregated "VAT" │
//! │ Exchange     │ computed amounts      │          │ record               │
//! │ Void         │ given lines, amounts  │ none     │ none                 │
//! │              │ zeroed                │          │                      │
//! └──────────────┴───────────────────────┴──────────┴──────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::{round_amount, sum_amounts};
use crate::basket::{Basket, BasketLine};
use crate::tender::ConfirmationDetails;
use crate::types::{
    FinalizedTransaction, PaymentType, TransactionHeader, TransactionPayment, TransactionTax,
    TransactionType,
};
use crate::DEFAULT_TAX_NAME;

/// Where and by whom a transaction is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionContext {
    pub transaction_id: String,
    pub store_id: String,
    pub terminal_id: String,
    pub shift_id: String,
    pub staff_id: String,
    pub receipt_id: String,
    pub currency: String,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Receipt id for the `sequence`-th receipt of a terminal on a day.
///
/// ```text
/// T01-20261016-0007
/// ```
pub fn format_receipt_id(terminal_id: &str, day: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:04}", terminal_id, day.format("%Y%m%d"), sequence)
}

/// The single tax record of an order.
///
/// The rate is the shared tax factor as a percentage when every active line
/// carries the same factor; otherwise the effective rate tax / net.
pub fn aggregate_tax<'a, I>(lines: I) -> TransactionTax
where
    I: IntoIterator<Item = &'a BasketLine>,
{
    let mut factor: Option<Decimal> = None;
    let mut uniform = true;
    let mut net = Vec::new();
    let mut tax = Vec::new();

    for line in lines.into_iter().filter(|l| !l.is_void) {
        let amounts = line.amounts();
        net.push(amounts.net);
        tax.push(amounts.tax);
        match factor {
            None => factor = Some(line.tax_factor),
            Some(f) if f != line.tax_factor => uniform = false,
            Some(_) => {}
        }
    }

    let tax_amount = sum_amounts(tax);
    let net_amount = sum_amounts(net);

    let tax_rate = match factor {
        Some(f) if uniform => f * Decimal::ONE_HUNDRED,
        _ if net_amount.is_zero() => Decimal::ZERO,
        _ => tax_amount / net_amount * Decimal::ONE_HUNDRED,
    };

    TransactionTax {
        tax_name: DEFAULT_TAX_NAME.to_string(),
        tax_rate: round_amount(tax_rate).normalize(),
        tax_amount,
    }
}

/// Builds the finalized record of a confirmed sale, return or exchange.
pub fn build_sale(
    basket: &Basket,
    confirmation: &ConfirmationDetails,
    context: &TransactionContext,
) -> FinalizedTransaction {
    let lines = basket
        .active_lines()
        .map(BasketLine::to_transaction_line)
        .collect();

    let payment = TransactionPayment {
        payment_date_time: context.created_at,
        method: confirmation.method,
        payment_type: PaymentType::for_total(confirmation.total),
        currency: context.currency.clone(),
        amount: confirmation.total,
        tendered: confirmation.tendered,
        change: confirmation.change,
    };

    FinalizedTransaction {
        header: header(context, confirmation.transaction_type, confirmation.total),
        lines,
        payment: Some(payment),
        tax: Some(aggregate_tax(basket.lines())),
    }
}

/// Builds a void journal record: the given lines with zero amounts.
///
/// Void lines are included as given; the caller picks which ones.
pub fn build_void<'a, I>(lines: I, context: &TransactionContext) -> FinalizedTransaction
where
    I: IntoIterator<Item = &'a BasketLine>,
{
    FinalizedTransaction {
        header: header(context, TransactionType::Void, round_amount(Decimal::ZERO)),
        lines: lines.into_iter().map(BasketLine::to_void_line).collect(),
        payment: None,
        tax: None,
    }
}

fn header(
    context: &TransactionContext,
    transaction_type: TransactionType,
    total: Decimal,
) -> TransactionHeader {
    TransactionHeader {
        transaction_id: context.transaction_id.clone(),
        store_id: context.store_id.clone(),
        terminal_id: context.terminal_id.clone(),
        shift_id: context.shift_id.clone(),
        staff_id: context.staff_id.clone(),
        receipt_id: context.receipt_id.clone(),
        business_date: context.business_date,
        currency: context.currency.clone(),
        total,
        transaction_type,
        created_at: context.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::tender::compute_confirmation;
    use crate::types::{PaymentMethod, Product, UnitPrice};

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn product(item_id: &str, factor: &str) -> Product {
        Product {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            barcode: format!("{}-BC", item_id),
            description: format!("Item {}", item_id),
            description_ar: None,
            plu_code: None,
            tax_group: "VAT".to_string(),
            tax_factor: d(factor),
        }
    }

    fn price(item_id: &str, value: &str, inclusive: bool) -> UnitPrice {
        UnitPrice {
            item_id: item_id.to_string(),
            unit_id: "EA".to_string(),
            unit_price: d(value),
            price_include_tax: if inclusive { Decimal::ONE } else { Decimal::ZERO },
        }
    }

    fn context() -> TransactionContext {
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        TransactionContext {
            transaction_id: "tx-1".to_string(),
            store_id: "S001".to_string(),
            terminal_id: "T01".to_string(),
            shift_id: "SH1".to_string(),
            staff_id: "000160".to_string(),
            receipt_id: format_receipt_id("T01", day, 7),
            currency: "AED".to_string(),
            business_date: day,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_receipt_id_format() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(format_receipt_id("T01", day, 7), "T01-20260105-0007");
        assert_eq!(format_receipt_id("T01", day, 12345), "T01-20260105-12345");
    }

    #[test]
    fn test_sale_record_matches_basket() {
        let a = product("A", "0.05");
        let b = product("B", "0.05");
        let catalog = Catalog::new(
            vec![a.clone(), b.clone()],
            vec![price("A", "20.5", true), price("B", "10", false)],
            vec![],
        );
        let mut basket = Basket::new();
        basket.add_or_increment(&a, "EA", d("2"), &catalog).unwrap();
        let voided = basket.add_or_increment(&b, "EA", d("1"), &catalog).unwrap();
        basket.void_line(voided).unwrap();

        let confirmation = compute_confirmation(&basket, PaymentMethod::Cash, Some(d("50"))).unwrap();
        let record = build_sale(&basket, &confirmation, &context());

        assert_eq!(record.header.receipt_id, "T01-20261016-0007");
        assert_eq!(record.header.total, d("41.000"));
        assert_eq!(record.header.transaction_type, TransactionType::Sale);
        assert_eq!(record.lines.len(), 1);

        let tax = record.tax.unwrap();
        assert_eq!(tax.tax_name, "VAT");
        assert_eq!(tax.tax_rate, d("5"));
        assert_eq!(tax.tax_amount, d("1.952"));

        let payment = record.payment.unwrap();
        assert_eq!(payment.payment_type, PaymentType::Payment);
        assert_eq!(payment.change, d("9.000"));
    }

    #[test]
    fn test_mixed_rates_use_effective_rate() {
        let a = product("A", "0.05");
        let z = product("Z", "0");
        let catalog = Catalog::new(
            vec![a.clone(), z.clone()],
            vec![price("A", "100", false), price("Z", "100", false)],
            vec![],
        );
        let mut basket = Basket::new();
        basket.add_or_increment(&a, "EA", d("1"), &catalog).unwrap();
        basket.add_or_increment(&z, "EA", d("1"), &catalog).unwrap();

        let tax = aggregate_tax(basket.lines());
        assert_eq!(tax.tax_amount, d("5.000"));
        assert_eq!(tax.tax_rate, d("2.5"));
    }

    #[test]
    fn test_void_record_zeroes_amounts() {
        let a = product("A", "0.05");
        let catalog = Catalog::new(vec![a.clone()], vec![price("A", "20.5", true)], vec![]);
        let mut basket = Basket::new();
        basket.add_or_increment(&a, "EA", d("2"), &catalog).unwrap();

        let record = build_void(basket.lines(), &context());
        assert_eq!(record.header.transaction_type, TransactionType::Void);
        assert!(record.header.total.is_zero());
        assert!(record.payment.is_none());
        assert!(record.tax.is_none());
        assert_eq!(record.lines.len(), 1);
        assert_eq!(record.lines[0].quantity, d("2"));
        assert!(record.lines[0].gross_amount.is_zero());
    }
}
