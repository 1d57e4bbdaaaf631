//! # Catalog Commands
//!
//! ERP catalog sync, price check and product search.

use serde::Serialize;
use tracing::info;

use d365pos_core::validation::validate_search_query;
use d365pos_core::{CoreError, Product, UnitPrice};
use d365pos_db::CatalogRepository;
use d365pos_sync::{CatalogSyncReport, CatalogSyncService, SyncStep};

use crate::error::{ApiError, ErrorCode};
use crate::state::SessionState;

/// Default number of search hits.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Per-step summary of a sync run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStepSummary {
    pub step: String,
    pub received: usize,
    pub stored: usize,
    pub skipped: usize,
    pub kept_previous: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub steps: Vec<SyncStepSummary>,
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub products: usize,
    pub prices: usize,
}

impl SyncResponse {
    fn from_report(report: &CatalogSyncReport, products: usize, prices: usize) -> Self {
        SyncResponse {
            steps: report
                .steps
                .iter()
                .map(|s| SyncStepSummary {
                    step: s.step.to_string(),
                    received: s.received,
                    stored: s.stored,
                    skipped: s.skipped,
                    kept_previous: s.kept_previous,
                })
                .collect(),
            failed_step: report.failure.as_ref().map(|f| f.step.to_string()),
            error: report.failure.as_ref().map(|f| f.error.to_string()),
            products,
            prices,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_step.is_none()
    }
}

/// Price check result for one item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCheckResponse {
    pub item_id: String,
    pub description: Option<String>,
    pub prices: Vec<UnitPrice>,
}

/// Pulls products, prices and masks from the ERP and reloads the session
/// catalog.
///
/// The busy flag is held for the whole run. A failed step is reported in
/// the response; tables synced before it keep their new rows.
pub async fn sync_catalog(
    session: &SessionState,
    service: &CatalogSyncService,
    repository: &CatalogRepository,
) -> Result<SyncResponse, ApiError> {
    let _busy = session.begin_busy()?;

    let report = service.sync_all().await;
    for step in SyncStep::ALL {
        if let Some(s) = report.step(step) {
            info!(step = %s.step, received = s.received, stored = s.stored, skipped = s.skipped, "Sync step");
        }
    }

    let catalog = repository.load_catalog().await?;
    let (products, prices) = (catalog.product_count(), catalog.price_count());
    session.replace_catalog(catalog);

    Ok(SyncResponse::from_report(&report, products, prices))
}

/// Lists the unit prices of an item (case-insensitive item id).
pub fn price_check(session: &SessionState, item_id: &str) -> Result<PriceCheckResponse, ApiError> {
    let item_id = item_id.trim();
    if item_id.is_empty() {
        return Err(ApiError::validation("item id is required"));
    }

    let catalog = session.catalog();
    let prices: Vec<UnitPrice> = catalog.prices_for(item_id).into_iter().cloned().collect();
    let product = catalog
        .products()
        .iter()
        .find(|p| p.item_id.eq_ignore_ascii_case(item_id));

    if prices.is_empty() {
        return match product {
            Some(p) => Err(ApiError::new(
                ErrorCode::BusinessLogic,
                format!("Item {} has no unit prices", p.item_id),
            )),
            None => Err(ApiError::not_found("Item", item_id)),
        };
    }

    Ok(PriceCheckResponse {
        item_id: product
            .map(|p| p.item_id.clone())
            .unwrap_or_else(|| prices[0].item_id.clone()),
        description: product.map(|p| p.description.clone()),
        prices,
    })
}

/// Case-insensitive search over description, barcode and item id.
pub fn search_products(
    session: &SessionState,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<Product>, ApiError> {
    let query = validate_search_query(query).map_err(CoreError::from)?;
    let catalog = session.catalog();
    Ok(catalog
        .search(&query, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
        .into_iter()
        .cloned()
        .collect())
}
