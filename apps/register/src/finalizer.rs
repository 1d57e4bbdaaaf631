//! # Sale Finalizer
//!
//! Turns a confirmed basket into a committed sale.
//!
//! ## Two-Phase Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Finalize Flow                                        │
//! │                                                                         │
//! │  confirm(method, tendered)                                              │
//! │     │   NoItems / InsufficientTender rejected here                      │
//! │     ▼                                                                   │
//! │  ConfirmationDetails { total, tendered, change } ──► operator y/n      │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  commit(confirmation, confirmed)                                        │
//! │     │   confirmed == false ──► nothing changes                         │
//! │     │                                                                   │
//! │     ├─ 1. busy flag raised                                              │
//! │     ├─ 2. receipt id from the journal sequence                         │
//! │     ├─ 3. POST recordSales ──── failure ──► RemoteFailure              │
//! │     │                                       basket kept, no journal    │
//! │     ├─ 4. journal insert ────── failure ──► LocalPersistFailure        │
//! │     │                                       (ERP already has the sale) │
//! │     ├─ 5. receipt ──► sink (failure logged only)                       │
//! │     └─ 6. basket reset                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ERP submission always completes before anything is written locally.
//! Voids never reach the ERP; they are journaled with zero amounts.

use std::sync::Arc;

use chrono::{Local, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use d365pos_core::{
    build_sale, build_void, compute_confirmation, format_receipt_id, Basket, ConfirmationDetails,
    CoreError, FinalizedTransaction, PaymentMethod, Receipt, ReceiptContext, ReceiptFormatter,
    TransactionContext,
};
use d365pos_db::{DbError, JournalStore};
use d365pos_sync::{RecordSalesRequest, SalesRecordingClient, SyncError};

use crate::printer::ReceiptSink;
use crate::state::{AppConfig, ReceiptSettings, SessionState, StoreSettings};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("Basket has no items")]
    NoItems,

    #[error("Tendered {tendered} is less than amount due {due}")]
    InsufficientTender { tendered: Decimal, due: Decimal },

    /// Basket changed between confirmation and commit.
    #[error("Basket changed since the payment was confirmed")]
    StaleConfirmation,

    #[error("Register is busy")]
    Busy,

    /// The ERP did not accept the sale. Nothing was written.
    #[error("ERP did not record the sale: {0}")]
    RemoteFailure(#[source] SyncError),

    /// The ERP accepted the sale but the local journal insert failed.
    #[error("Sale {receipt_id} was recorded in the ERP but not in the local journal: {source}")]
    LocalPersistFailure {
        receipt_id: String,
        #[source]
        source: DbError,
    },

    #[error("Journal error: {0}")]
    Journal(#[from] DbError),

    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for FinalizeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoItems => FinalizeError::NoItems,
            CoreError::InsufficientTender { tendered, due } => {
                FinalizeError::InsufficientTender { tendered, due }
            }
            other => FinalizeError::Core(other),
        }
    }
}

/// A committed sale and its receipt.
#[derive(Debug, Clone)]
pub struct SaleOutcome {
    pub transaction: FinalizedTransaction,
    pub receipt: Receipt,
}

// =============================================================================
// Finalizer
// =============================================================================

pub struct SaleFinalizer {
    sales: Arc<dyn SalesRecordingClient>,
    journal: Arc<dyn JournalStore>,
    sink: Arc<dyn ReceiptSink>,
    company: String,
    store: StoreSettings,
    receipt: ReceiptSettings,
    formatter: ReceiptFormatter,
}

impl SaleFinalizer {
    pub fn new(
        sales: Arc<dyn SalesRecordingClient>,
        journal: Arc<dyn JournalStore>,
        sink: Arc<dyn ReceiptSink>,
        config: &AppConfig,
    ) -> Self {
        SaleFinalizer {
            sales,
            journal,
            sink,
            company: config.erp.company.clone(),
            store: config.store.clone(),
            receipt: config.receipt.clone(),
            formatter: ReceiptFormatter::new(config.receipt.width),
        }
    }

    /// Phase one: validates the tender and computes change. Changes nothing.
    pub fn confirm(
        &self,
        session: &SessionState,
        method: PaymentMethod,
        tendered: Option<Decimal>,
    ) -> Result<ConfirmationDetails, FinalizeError> {
        if session.is_busy() {
            return Err(FinalizeError::Busy);
        }
        let confirmation =
            session.with_basket(|basket| compute_confirmation(basket, method, tendered))?;
        debug!(
            method = %confirmation.method,
            total = %confirmation.total,
            change = %confirmation.change,
            "Payment confirmation computed"
        );
        Ok(confirmation)
    }

    /// Phase two: submits, journals and prints the confirmed sale.
    ///
    /// Returns `Ok(None)` when the operator declined the confirmation.
    pub async fn commit(
        &self,
        session: &SessionState,
        confirmation: &ConfirmationDetails,
        confirmed: bool,
    ) -> Result<Option<SaleOutcome>, FinalizeError> {
        if !confirmed {
            info!("Payment confirmation declined, basket kept");
            return Ok(None);
        }

        let guard = session.begin_busy().map_err(|_| FinalizeError::Busy)?;
        let basket = session.with_basket_while_busy(&guard, |basket| basket.clone());

        if basket.is_empty() {
            return Err(FinalizeError::NoItems);
        }
        if !confirmation.matches_basket(&basket) {
            return Err(FinalizeError::StaleConfirmation);
        }

        let context = self.next_context().await?;
        let transaction = build_sale(&basket, confirmation, &context);
        let request = RecordSalesRequest::from_transaction(&self.company, &transaction);

        info!(
            receipt_id = %context.receipt_id,
            transaction_type = %transaction.header.transaction_type,
            total = %transaction.header.total,
            lines = transaction.lines.len(),
            "Submitting sale to ERP"
        );
        if let Err(err) = self.sales.record_sales(&request).await {
            warn!(receipt_id = %context.receipt_id, error = %err, "ERP rejected sale, basket kept");
            return Err(FinalizeError::RemoteFailure(err));
        }

        let persisted = self.journal.record(&transaction).await;
        if let Err(err) = &persisted {
            error!(
                receipt_id = %context.receipt_id,
                error = %err,
                "Sale recorded in ERP but journal insert failed"
            );
        }

        let receipt = self.formatter.format(
            &self.receipt_context(&context),
            basket.lines(),
            confirmation,
        );
        self.emit(&receipt).await;

        session.with_basket_while_busy(&guard, Basket::reset);
        drop(guard);

        match persisted {
            Ok(()) => {
                info!(receipt_id = %context.receipt_id, "Sale finalized");
                Ok(Some(SaleOutcome {
                    transaction,
                    receipt,
                }))
            }
            Err(source) => Err(FinalizeError::LocalPersistFailure {
                receipt_id: context.receipt_id,
                source,
            }),
        }
    }

    /// Confirms and commits in one step (card, exact cash).
    pub async fn finalize(
        &self,
        session: &SessionState,
        method: PaymentMethod,
        tendered: Option<Decimal>,
    ) -> Result<SaleOutcome, FinalizeError> {
        let confirmation = self.confirm(session, method, tendered)?;
        self.commit(session, &confirmation, true)
            .await?
            .ok_or(FinalizeError::StaleConfirmation)
    }

    /// Journals every basket line as a void and clears the basket.
    pub async fn void_transaction(
        &self,
        session: &SessionState,
    ) -> Result<FinalizedTransaction, FinalizeError> {
        let guard = session.begin_busy().map_err(|_| FinalizeError::Busy)?;
        let lines = session.with_basket_while_busy(&guard, |basket| basket.lines().to_vec());
        if lines.is_empty() {
            return Err(FinalizeError::NoItems);
        }

        let context = self.next_context().await?;
        let transaction = build_void(&lines, &context);
        self.journal.record(&transaction).await?;

        session.with_basket_while_busy(&guard, Basket::reset);
        info!(receipt_id = %context.receipt_id, lines = lines.len(), "Transaction voided");
        Ok(transaction)
    }

    /// Voids one line and journals it.
    ///
    /// Voiding an already void line is a no-op and returns `Ok(None)`.
    pub async fn void_line(
        &self,
        session: &SessionState,
        line_num: u32,
    ) -> Result<Option<FinalizedTransaction>, FinalizeError> {
        let guard = session.begin_busy().map_err(|_| FinalizeError::Busy)?;
        let line = session
            .with_basket_while_busy(&guard, |basket| basket.line(line_num).cloned())
            .ok_or(CoreError::LineNotFound(line_num))?;
        if line.is_void {
            debug!(line_num, "Line already void");
            return Ok(None);
        }

        let context = self.next_context().await?;
        let transaction = build_void(std::iter::once(&line), &context);
        self.journal.record(&transaction).await?;

        session.with_basket_while_busy(&guard, |basket| basket.void_line(line_num).map(|_| ()))?;
        info!(receipt_id = %context.receipt_id, line_num, item_id = %line.item_id, "Line voided");
        Ok(Some(transaction))
    }

    async fn next_context(&self) -> Result<TransactionContext, FinalizeError> {
        let business_date = Local::now().date_naive();
        let sequence = self
            .journal
            .next_receipt_sequence(&self.store.terminal_id, business_date)
            .await?;

        Ok(TransactionContext {
            transaction_id: Uuid::new_v4().to_string(),
            store_id: self.store.store_id.clone(),
            terminal_id: self.store.terminal_id.clone(),
            shift_id: self.store.shift_id.clone(),
            staff_id: self.store.staff_id.clone(),
            receipt_id: format_receipt_id(&self.store.terminal_id, business_date, sequence),
            currency: self.store.currency.clone(),
            business_date,
            created_at: Utc::now(),
        })
    }

    fn receipt_context(&self, context: &TransactionContext) -> ReceiptContext {
        ReceiptContext {
            header: self.receipt.header.clone(),
            footer: self.receipt.footer.clone(),
            store_id: context.store_id.clone(),
            terminal_id: context.terminal_id.clone(),
            staff_id: context.staff_id.clone(),
            receipt_id: context.receipt_id.clone(),
            currency: context.currency.clone(),
            printed_at: context.created_at,
        }
    }

    async fn emit(&self, receipt: &Receipt) {
        if let Err(err) = self.sink.emit(receipt).await {
            warn!(receipt_id = %receipt.receipt_id, error = %err, "Receipt output failed");
        }
    }
}
