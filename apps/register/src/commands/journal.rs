//! # Journal Commands
//!
//! Read-only views over finalized transactions.

use serde::Serialize;

use d365pos_core::amount::format_amount;
use d365pos_core::FinalizedTransaction;
use d365pos_db::{JournalEntry, TransactionRepository};

use crate::error::ApiError;

/// Default number of journal rows listed.
pub const DEFAULT_JOURNAL_LIMIT: u32 = 50;

/// One journal row; amounts are formatted to three decimals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRow {
    pub transaction_id: String,
    pub receipt_id: String,
    pub transaction_type: String,
    pub created_at: String,
    pub lines: usize,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

impl From<&JournalEntry> for JournalRow {
    fn from(entry: &JournalEntry) -> Self {
        JournalRow {
            transaction_id: entry.header.transaction_id.clone(),
            receipt_id: entry.header.receipt_id.clone(),
            transaction_type: entry.header.transaction_type.to_string(),
            created_at: entry.header.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            lines: entry.line_count,
            subtotal: format_amount(entry.subtotal),
            tax: format_amount(entry.tax),
            total: format_amount(entry.total),
        }
    }
}

/// Newest transactions first.
pub async fn list_journal(
    transactions: &TransactionRepository,
    limit: Option<u32>,
) -> Result<Vec<JournalRow>, ApiError> {
    let entries = transactions
        .list_recent(limit.unwrap_or(DEFAULT_JOURNAL_LIMIT))
        .await?;
    Ok(entries.iter().map(JournalRow::from).collect())
}

/// Full transaction (lines, payment, tax) by receipt id.
pub async fn show_receipt(
    transactions: &TransactionRepository,
    receipt_id: &str,
) -> Result<FinalizedTransaction, ApiError> {
    transactions
        .find_by_receipt(receipt_id.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Receipt", receipt_id.trim()))
}
