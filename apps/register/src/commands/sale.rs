//! # Sale Commands
//!
//! Payment confirmation, commit and the void flows.
//!
//! ## Payment Flow
//! ```text
//! pay cash 50
//!      │
//!      ▼
//! confirm_payment ──► PaymentPrompt { total, tendered, change }
//!      │
//!      ▼
//! operator answers y / n
//!      │
//!      ▼
//! commit_payment(prompt, confirmed) ──► SaleResponse | nothing
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use d365pos_core::amount::{format_amount, parse_amount};
use d365pos_core::{ConfirmationDetails, CoreError, PaymentMethod, TransactionType};

use crate::commands::basket::BasketResponse;
use crate::error::ApiError;
use crate::finalizer::SaleFinalizer;
use crate::state::SessionState;

/// What the operator confirms before the sale is committed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPrompt {
    pub details: ConfirmationDetails,
    pub line_count: usize,
}

impl PaymentPrompt {
    /// One-line prompt shown before commit.
    pub fn summary(&self) -> String {
        let details = &self.details;
        let mut text = format!(
            "{} {} line(s), total {} by {}",
            details.transaction_type,
            self.line_count,
            format_amount(details.total),
            details.method
        );
        if details.method == PaymentMethod::Cash && details.total > Decimal::ZERO {
            text.push_str(&format!(
                ", tendered {}, change {}",
                format_amount(details.tendered),
                format_amount(details.change)
            ));
        }
        text
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub receipt_id: String,
    pub transaction_type: TransactionType,
    pub total: Decimal,
    pub change: Decimal,
    pub receipt: String,
}

/// Parses the optional tendered amount and computes the confirmation.
pub fn confirm_payment(
    finalizer: &SaleFinalizer,
    session: &SessionState,
    method: PaymentMethod,
    tendered: Option<&str>,
) -> Result<PaymentPrompt, ApiError> {
    let tendered = tendered
        .map(|text| parse_amount("tendered", text))
        .transpose()
        .map_err(CoreError::from)?;

    let details = finalizer.confirm(session, method, tendered)?;
    Ok(PaymentPrompt {
        line_count: details.totals.active_lines,
        details,
    })
}

/// Commits a confirmed payment. `Ok(None)` when the operator declined.
pub async fn commit_payment(
    finalizer: &SaleFinalizer,
    session: &SessionState,
    prompt: &PaymentPrompt,
    confirmed: bool,
) -> Result<Option<SaleResponse>, ApiError> {
    let outcome = finalizer.commit(session, &prompt.details, confirmed).await?;
    Ok(outcome.map(|outcome| SaleResponse {
        receipt_id: outcome.transaction.header.receipt_id.clone(),
        transaction_type: outcome.transaction.header.transaction_type,
        total: outcome.transaction.header.total,
        change: prompt.details.change,
        receipt: outcome.receipt.render(),
    }))
}

/// Voids one basket line and journals it.
pub async fn void_line(
    finalizer: &SaleFinalizer,
    session: &SessionState,
    line_num: u32,
) -> Result<BasketResponse, ApiError> {
    if finalizer.void_line(session, line_num).await?.is_none() {
        debug!(line_num, "void_line on an already void line");
    }
    Ok(session.with_basket(|basket| BasketResponse::from(basket)))
}

/// Voids the whole basket and journals it. Returns the void receipt id.
pub async fn cancel_transaction(
    finalizer: &SaleFinalizer,
    session: &SessionState,
) -> Result<String, ApiError> {
    let transaction = finalizer.void_transaction(session).await?;
    Ok(transaction.header.receipt_id)
}
