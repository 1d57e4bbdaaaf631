//! # Basket Commands
//!
//! Scanning, quantity corrections and return seeding.
//!
//! ## Basket Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Basket Lifecycle                                     │
//! │                                                                         │
//! │  ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐       │
//! │  │  Empty   │────►│ In Basket│────►│ Confirm  │────►│ Finalized│       │
//! │  │  Basket  │     │          │     │ payment  │     │   Sale   │       │
//! │  └──────────┘     └──────────┘     └──────────┘     └──────────┘       │
//! │       │                │                                  │            │
//! │  seed_return       scan_code                              │            │
//! │       │            set_quantity                           │            │
//! │       └──────────► void_line (sale.rs)                    │            │
//! │                        │                                  ▼            │
//! │                   cancel_transaction ──────────────► (back to empty)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use d365pos_core::validation::validate_code;
use d365pos_core::{
    Basket, BarcodeResolver, BasketLine, BasketTotals, MatchSource, TransactionType,
};
use d365pos_db::JournalStore;

use crate::error::{ApiError, ErrorCode};
use crate::state::SessionState;

/// Basket contents and totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketResponse {
    pub lines: Vec<BasketLine>,
    pub totals: BasketTotals,
    pub transaction_type: TransactionType,
}

impl From<&Basket> for BasketResponse {
    fn from(basket: &Basket) -> Self {
        BasketResponse {
            lines: basket.lines().to_vec(),
            totals: basket.totals(),
            transaction_type: basket.transaction_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub line_num: u32,
    pub source: MatchSource,
    pub basket: BasketResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnSeedResponse {
    pub original_receipt_id: String,
    pub seeded: usize,
    pub skipped: usize,
    pub basket: BasketResponse,
}

pub fn get_basket(session: &SessionState) -> BasketResponse {
    session.with_basket(|basket| BasketResponse::from(basket))
}

/// Resolves a scanned or typed code and adds it to the basket.
///
/// ## Resolution Order
/// barcode, then item id, then barcode mask (PLU + embedded price/quantity).
/// A code that matches none of them is `NOT_FOUND`; on that or a broken mask
/// the basket is unchanged.
pub fn scan_code(session: &SessionState, code: &str) -> Result<ScanResponse, ApiError> {
    let code = validate_code(code).map_err(d365pos_core::CoreError::from)?;
    let catalog = session.catalog();
    let resolution = BarcodeResolver::new(&catalog).resolve(&code)?;
    debug!(code = %code, item_id = %resolution.product.item_id, source = ?resolution.source, "Code resolved");

    session.with_basket_mut(|basket| {
        let line_num = basket.add_or_increment(
            &resolution.product,
            &resolution.unit_id,
            resolution.quantity,
            &catalog,
        )?;
        Ok(ScanResponse {
            line_num,
            source: resolution.source,
            basket: BasketResponse::from(&*basket),
        })
    })
}

/// Corrects the quantity of an active line.
pub fn set_quantity(
    session: &SessionState,
    line_num: u32,
    quantity: Decimal,
) -> Result<BasketResponse, ApiError> {
    let catalog = session.catalog();
    session.with_basket_mut(|basket| {
        basket.set_quantity(line_num, quantity, &catalog)?;
        Ok(BasketResponse::from(&*basket))
    })
}

/// Adds the lines of a previous sale to the basket with negated quantities.
///
/// Lines whose item or price is no longer in the catalog are skipped.
pub async fn seed_return(
    session: &SessionState,
    journal: &dyn JournalStore,
    receipt_id: &str,
) -> Result<ReturnSeedResponse, ApiError> {
    let receipt_id = validate_code(receipt_id).map_err(d365pos_core::CoreError::from)?;
    if session.is_busy() {
        return Err(ApiError::busy());
    }

    let original = journal
        .find_by_receipt(&receipt_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Receipt", &receipt_id))?;

    match original.header.transaction_type {
        TransactionType::Sale | TransactionType::Exchange => {}
        other => {
            return Err(ApiError::new(
                ErrorCode::BusinessLogic,
                format!("Receipt {} is a {} and cannot be returned", receipt_id, other),
            ))
        }
    }

    let catalog = session.catalog();
    let returnable: Vec<_> = original
        .lines
        .iter()
        .filter(|l| l.quantity > Decimal::ZERO)
        .cloned()
        .collect();

    session.with_basket_mut(|basket| {
        let seeded = basket.seed_return(&returnable, &catalog);
        info!(
            receipt_id = %receipt_id,
            seeded,
            skipped = returnable.len() - seeded,
            "Return lines seeded"
        );
        Ok(ReturnSeedResponse {
            original_receipt_id: receipt_id.clone(),
            seeded,
            skipped: returnable.len() - seeded,
            basket: BasketResponse::from(&*basket),
        })
    })
}
