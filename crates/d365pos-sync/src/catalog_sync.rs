//! # Catalog Sync Service
//!
//! Pulls the store catalog from the ERP and replaces the local tables.
//!
//! ## Sync Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   1. Products ──► 2. Prices ──► 3. Barcode masks                       │
//! │        │              │               │                                 │
//! │        ▼              ▼               ▼                                 │
//! │   fetch → map → replace (one SQLite transaction per step)              │
//! │                                                                         │
//! │   • empty response      → previous table kept, step reported as kept   │
//! │   • unmappable record   → skipped and logged                           │
//! │   • fetch/store failure → run stops, later steps are not attempted     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use d365pos_db::CatalogRepository;

use crate::client::CatalogSyncClient;
use crate::error::{SyncError, SyncResult};

/// One step of a sync run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Products,
    Prices,
    BarcodeMasks,
}

impl SyncStep {
    pub const ALL: [SyncStep; 3] = [SyncStep::Products, SyncStep::Prices, SyncStep::BarcodeMasks];
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::Products => write!(f, "products"),
            SyncStep::Prices => write!(f, "prices"),
            SyncStep::BarcodeMasks => write!(f, "barcode masks"),
        }
    }
}

/// Outcome of a completed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: SyncStep,

    /// Records in the ERP response.
    pub received: usize,

    /// Rows written locally.
    pub stored: usize,

    /// Records that could not be mapped.
    pub skipped: usize,

    /// True when nothing usable arrived and the previous rows were kept.
    pub kept_previous: bool,
}

/// The step that stopped a run.
#[derive(Debug)]
pub struct StepFailure {
    pub step: SyncStep,
    pub error: SyncError,
}

/// Everything a sync run did.
#[derive(Debug, Default)]
pub struct CatalogSyncReport {
    pub steps: Vec<StepReport>,
    pub failure: Option<StepFailure>,
}

impl CatalogSyncReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// True when at least one table was replaced.
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|s| !s.kept_previous)
    }

    pub fn step(&self, step: SyncStep) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == step)
    }
}

/// Runs catalog syncs for one store.
pub struct CatalogSyncService {
    client: Arc<dyn CatalogSyncClient>,
    catalog: CatalogRepository,
    store_id: String,
}

impl CatalogSyncService {
    pub fn new(
        client: Arc<dyn CatalogSyncClient>,
        catalog: CatalogRepository,
        store_id: impl Into<String>,
    ) -> Self {
        CatalogSyncService {
            client,
            catalog,
            store_id: store_id.into(),
        }
    }

    /// Runs products, prices and masks in order, stopping at the first failure.
    pub async fn sync_all(&self) -> CatalogSyncReport {
        let mut report = CatalogSyncReport::default();

        for step in SyncStep::ALL {
            match self.sync_step(step).await {
                Ok(step_report) => report.steps.push(step_report),
                Err(err) => {
                    error!(step = %step, error = %err, "Catalog sync step failed");
                    report.failure = Some(StepFailure { step, error: err });
                    break;
                }
            }
        }

        info!(
            store_id = %self.store_id,
            complete = report.is_complete(),
            changed = report.changed(),
            "Catalog sync finished"
        );
        report
    }

    /// Runs a single step.
    pub async fn sync_step(&self, step: SyncStep) -> SyncResult<StepReport> {
        match step {
            SyncStep::Products => {
                let records = self.client.active_products(&self.store_id).await?;
                let received = records.len();
                let (rows, skipped) = map_records(step, records, |r| r.into_product());
                let stored = if has_rows(step, &rows) {
                    Some(self.catalog.replace_products(&rows).await?)
                } else {
                    None
                };
                Ok(report(step, received, stored, skipped))
            }
            SyncStep::Prices => {
                let records = self.client.active_prices(&self.store_id).await?;
                let received = records.len();
                let (rows, skipped) = map_records(step, records, |r| r.into_unit_price());
                let stored = if has_rows(step, &rows) {
                    Some(self.catalog.replace_prices(&rows).await?)
                } else {
                    None
                };
                Ok(report(step, received, stored, skipped))
            }
            SyncStep::BarcodeMasks => {
                let records = self.client.barcode_masks().await?;
                let received = records.len();
                let (rows, skipped) = map_records(step, records, |r| r.into_mask());
                let stored = if has_rows(step, &rows) {
                    Some(self.catalog.replace_masks(&rows).await?)
                } else {
                    None
                };
                Ok(report(step, received, stored, skipped))
            }
        }
    }
}

fn map_records<D, T, F>(step: SyncStep, records: Vec<D>, map: F) -> (Vec<T>, usize)
where
    F: Fn(D) -> SyncResult<T>,
{
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        match map(record) {
            Ok(row) => rows.push(row),
            Err(err) => {
                skipped += 1;
                warn!(step = %step, error = %err, "Skipping ERP record");
            }
        }
    }
    (rows, skipped)
}

/// False (and logged) when nothing usable arrived.
fn has_rows<T>(step: SyncStep, rows: &[T]) -> bool {
    if rows.is_empty() {
        warn!(step = %step, "ERP returned no usable rows, keeping local data");
        return false;
    }
    true
}

fn report(step: SyncStep, received: usize, stored: Option<usize>, skipped: usize) -> StepReport {
    StepReport {
        step,
        received,
        stored: stored.unwrap_or(0),
        skipped,
        kept_previous: stored.is_none(),
    }
}
