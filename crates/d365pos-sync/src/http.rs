//! # HTTP ERP Client
//!
//! reqwest implementation of [`SalesRecordingClient`],
//! [`CatalogSyncClient`] and [`SignInClient`]. Every call is a
//! bearer-authenticated JSON POST with its own timeout:
//!
//! ```text
//! recordSales              30 s (sales_timeout_secs)
//! getActive* / getProduct* 15 s (catalog_timeout_secs)
//! getUser / getStore       10 s (auth_timeout_secs)
//! ```
//!
//! Failures are never retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::client::{
    ActiveProductDto, ActiveProductPriceDto, BarcodeMaskDto, CatalogSyncClient, CompanyRequest,
    GetStoreRequest, GetUserRequest, RecordSalesRequest, SalesRecordingClient, SignInClient,
    StoreCatalogRequest, StoreResponse, UserResponse,
};
use crate::config::{ErpConfig, ErpOperation};
use crate::error::{SyncError, SyncResult};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpErpClient {
    config: ErpConfig,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpErpClient {
    pub fn new(config: ErpConfig, http: reqwest::Client, tokens: Arc<dyn TokenProvider>) -> Self {
        HttpErpClient {
            config,
            http,
            tokens,
        }
    }

    pub fn company(&self) -> &str {
        &self.config.company
    }

    /// Sends a JSON POST and returns the response if the status is 2xx.
    async fn post<B>(
        &self,
        operation: ErpOperation,
        body: &B,
        timeout: Duration,
    ) -> SyncResult<reqwest::Response>
    where
        B: Serialize + Sync,
    {
        let url = self.config.operation_url(operation)?;
        let token = self.tokens.access_token().await?;

        debug!(operation = %operation, url = %url, "Calling ERP");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| text.is_char_boundary(i))
                    .unwrap_or(0);
                text.truncate(cut);
            }
            warn!(operation = %operation, status = status.as_u16(), "ERP call failed");
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(response)
    }

    async fn fetch_list<B, R>(&self, operation: ErpOperation, body: &B) -> SyncResult<Vec<R>>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .post(operation, body, self.config.catalog_timeout())
            .await?;
        let bytes = response.bytes().await?;

        // The service answers an empty body instead of [] when nothing is active.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let items: Option<Vec<R>> = serde_json::from_slice(&bytes)?;
        let items = items.unwrap_or_default();
        debug!(operation = %operation, count = items.len(), "ERP list received");
        Ok(items)
    }

    async fn fetch_one<B, R>(&self, operation: ErpOperation, body: &B) -> SyncResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .post(operation, body, self.config.auth_timeout())
            .await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl SalesRecordingClient for HttpErpClient {
    async fn record_sales(&self, request: &RecordSalesRequest) -> SyncResult<()> {
        let receipt_id = request
            .sale_items
            .first()
            .map(|s| s.receipt_id.as_str())
            .unwrap_or_default();

        self.post(ErpOperation::RecordSales, request, self.config.sales_timeout())
            .await?;

        info!(receipt_id = %receipt_id, "Sale recorded in ERP");
        Ok(())
    }
}

#[async_trait]
impl CatalogSyncClient for HttpErpClient {
    async fn active_products(&self, store_id: &str) -> SyncResult<Vec<ActiveProductDto>> {
        let body = StoreCatalogRequest {
            company: &self.config.company,
            store_id,
        };
        self.fetch_list(ErpOperation::GetActiveProducts, &body).await
    }

    async fn active_prices(&self, store_id: &str) -> SyncResult<Vec<ActiveProductPriceDto>> {
        let body = StoreCatalogRequest {
            company: &self.config.company,
            store_id,
        };
        self.fetch_list(ErpOperation::GetActiveProductPrices, &body)
            .await
    }

    async fn barcode_masks(&self) -> SyncResult<Vec<BarcodeMaskDto>> {
        let body = CompanyRequest {
            company: &self.config.company,
        };
        self.fetch_list(ErpOperation::GetProductBarcodes, &body).await
    }
}

#[async_trait]
impl SignInClient for HttpErpClient {
    async fn get_user(&self, user_id: &str, password: &str) -> SyncResult<UserResponse> {
        let body = GetUserRequest { user_id, password };
        let response: UserResponse = self.fetch_one(ErpOperation::GetUser, &body).await?;
        debug!(user_id = %user_id, status = ?response.status, "getUser answered");
        Ok(response)
    }

    async fn get_store(&self, user_id: &str, company: &str) -> SyncResult<StoreResponse> {
        let body = GetStoreRequest { user_id, company };
        let response: StoreResponse = self.fetch_one(ErpOperation::GetStore, &body).await?;
        debug!(user_id = %user_id, company = %company, status = ?response.status, "getStore answered");
        Ok(response)
    }
}
