//! # Receipt Layout
//!
//! Fixed-width text receipt built from the finalized basket.
//!
//! ## Layout (42 columns)
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             Riyadh Main Store            │  header lines, centered
//! │------------------------------------------│
//! │Receipt                   T01-20261016-007│
//! │Date                      2026-10-16 14:03│
//! │Terminal T01                   Staff 1001│
//! │------------------------------------------│
//! │Tomatoes                                  │  one block per line
//! │  2.500 x 4.500                     11.813│
//! │------------------------------------------│
//! │Subtotal                            39.048│
//! │VAT 5%                               1.952│
//! │TOTAL SAR                           41.000│
//! │------------------------------------------│
//! │Paid by Cash                        50.000│
//! │Change                               9.000│
//! └──────────────────────────────────────────┘
//! ```
//!
//! Rendering to ESC-POS or PDF is the receipt sink's job; this module only
//! guarantees the amounts and a stable column layout.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::{format_amount, round_amount};
use crate::basket::{BasketLine, BasketTotals};
use crate::tender::ConfirmationDetails;
use crate::types::{PaymentMethod, TransactionType};

/// Default receipt width for 80mm printers.
pub const DEFAULT_RECEIPT_WIDTH: usize = 42;

/// Tax collected at one rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    /// Percentage (5 = 5%).
    pub rate: Decimal,
    pub net: Decimal,
    pub tax: Decimal,
}

/// Who printed the receipt, where and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptContext {
    pub header: Vec<String>,
    pub footer: Vec<String>,
    pub store_id: String,
    pub terminal_id: String,
    pub staff_id: String,
    pub receipt_id: String,
    pub currency: String,
    pub printed_at: DateTime<Utc>,
}

/// A formatted receipt plus the totals it shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_id: String,
    pub transaction_type: TransactionType,
    pub totals: BasketTotals,
    pub breakdown: Vec<TaxBreakdown>,
    pub method: PaymentMethod,
    pub tendered: Decimal,
    pub change: Decimal,
    pub text_lines: Vec<String>,
}

impl Receipt {
    /// The receipt as one newline-separated string.
    pub fn render(&self) -> String {
        let mut out = self.text_lines.join("\n");
        out.push('\n');
        out
    }
}

/// Groups active lines by tax rate.
pub fn tax_breakdown<'a, I>(lines: I) -> Vec<TaxBreakdown>
where
    I: IntoIterator<Item = &'a BasketLine>,
{
    let mut by_rate: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines.into_iter().filter(|l| !l.is_void) {
        let amounts = line.amounts();
        let entry = by_rate
            .entry(line.tax_factor.normalize())
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += amounts.net;
        entry.1 += amounts.tax;
    }

    by_rate
        .into_iter()
        .map(|(factor, (net, tax))| TaxBreakdown {
            rate: (factor * Decimal::ONE_HUNDRED).normalize(),
            net: round_amount(net),
            tax: round_amount(tax),
        })
        .collect()
}

/// Builds fixed-width receipts.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptFormatter {
    width: usize,
}

impl Default for ReceiptFormatter {
    fn default() -> Self {
        ReceiptFormatter::new(DEFAULT_RECEIPT_WIDTH)
    }
}

impl ReceiptFormatter {
    /// Widths below 24 columns are raised to 24.
    pub fn new(width: usize) -> Self {
        ReceiptFormatter {
            width: width.max(24),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Formats the receipt of a confirmed basket.
    pub fn format(
        &self,
        context: &ReceiptContext,
        lines: &[BasketLine],
        confirmation: &ConfirmationDetails,
    ) -> Receipt {
        let breakdown = tax_breakdown(lines);
        let rule = "-".repeat(self.width);
        let mut out = Vec::new();

        for header in &context.header {
            out.push(self.center(header));
        }
        if confirmation.transaction_type != TransactionType::Sale {
            out.push(self.center(&confirmation.transaction_type.to_string().to_uppercase()));
        }
        out.push(rule.clone());
        out.push(self.columns("Receipt", &context.receipt_id));
        out.push(self.columns(
            "Date",
            &context.printed_at.format("%Y-%m-%d %H:%M").to_string(),
        ));
        out.push(self.columns(
            &format!("Terminal {}", context.terminal_id),
            &format!("Staff {}", context.staff_id),
        ));
        out.push(rule.clone());

        for line in lines.iter().filter(|l| !l.is_void) {
            out.push(self.truncate(&line.description));
            out.push(self.columns(
                &format!(
                    "  {} x {} {}",
                    format_amount(line.quantity),
                    format_amount(line.unit_price),
                    line.unit_id
                ),
                &format_amount(line.amounts().gross),
            ));
        }
        out.push(rule.clone());

        out.push(self.columns("Subtotal", &format_amount(confirmation.totals.net)));
        for entry in &breakdown {
            out.push(self.columns(&format!("VAT {}%", entry.rate), &format_amount(entry.tax)));
        }
        out.push(self.columns(
            &format!("TOTAL {}", context.currency),
            &format_amount(confirmation.total),
        ));
        out.push(rule);

        out.push(self.columns(
            &format!("Paid by {}", confirmation.method),
            &format_amount(confirmation.tendered),
        ));
        if confirmation.method == PaymentMethod::Cash {
            out.push(self.columns("Change", &format_amount(confirmation.change)));
        }

        for footer in &context.footer {
            out.push(self.center(footer));
        }

        Receipt {
            receipt_id: context.receipt_id.clone(),
            transaction_type: confirmation.transaction_type,
            totals: confirmation.totals,
            breakdown,
            method: confirmation.method,
            tendered: confirmation.tendered,
            change: confirmation.change,
            text_lines: out,
        }
    }

    /// `left` and `right` on one line, right flush; `left` is cut to fit.
    fn columns(&self, left: &str, right: &str) -> String {
        let right_len = right.chars().count();
        let room = self.width.saturating_sub(right_len + 1);
        let left: String = left.chars().take(room).collect();
        let pad = self.width.saturating_sub(left.chars().count() + right_len);
        format!("{}{}{}", left, " ".repeat(pad), right)
    }

    fn center(&self, text: &str) -> String {
        let text = self.truncate(text);
        let pad = (self.width - text.chars().count()) / 2;
        format!("{}{}", " ".repeat(pad), text)
    }

    fn truncate(&self, text: &str) -> String {
        text.chars().take(self.width).collect()
    }
}
