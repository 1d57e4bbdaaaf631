//! # d365pos-sync: ERP Integration
//!
//! Everything that crosses the network to Dynamics 365.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          d365pos-sync                                   │
//! │                                                                         │
//! │  ErpConfig ──► ErpAuth (TokenProvider)                                  │
//! │                   │ bearer token                                        │
//! │                   ▼                                                     │
//! │               HttpErpClient ── SalesRecordingClient ──► sale finalizer  │
//! │                   │                                                     │
//! │                   ├─────────── CatalogSyncClient                        │
//! │                   │                   │                                 │
//! │                   │                   ▼                                 │
//! │                   │          CatalogSyncService ──► CatalogRepository   │
//! │                   │                                                     │
//! │                   └─────────── SignInClient ──► SignInService           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use d365pos_sync::{CatalogSyncService, ErpAuth, HttpErpClient};
//!
//! let http = reqwest::Client::new();
//! let auth = Arc::new(ErpAuth::with_client(config.clone(), http.clone()));
//! let erp = Arc::new(HttpErpClient::new(config, http, auth));
//!
//! let report = CatalogSyncService::new(erp, db.catalog(), "S001").sync_all().await;
//! ```

pub mod auth;
pub mod catalog_sync;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod sign_in;

#[cfg(test)]
mod testing;

pub use auth::{ErpAuth, MockTokenProvider, TokenInfo, TokenProvider};
pub use catalog_sync::{CatalogSyncReport, CatalogSyncService, StepFailure, StepReport, SyncStep};
pub use client::{
    ActiveProductDto, ActiveProductPriceDto, BarcodeMaskDto, CatalogSyncClient,
    MockCatalogSyncClient, MockSalesRecordingClient, MockSignInClient, RecordSalesRequest,
    SalesRecordingClient, SignInClient, StoreResponse, UserResponse,
};
pub use config::{ErpConfig, ErpOperation};
pub use error::{SyncError, SyncResult};
pub use http::HttpErpClient;
pub use sign_in::{RegisterIdentity, SignInService};
