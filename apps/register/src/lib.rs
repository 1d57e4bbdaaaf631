//! # D365 POS Register
//!
//! The register application: session state, sale finalization, receipt
//! output and the command surface used by the `d365pos` binary.
//!
//! ## Module Organization
//! ```text
//! d365pos_register/
//! ├── lib.rs          ◄─── You are here (bootstrap, tracing)
//! ├── state/
//! │   ├── config.rs   ◄─── register.toml + D365POS_* overrides
//! │   └── session.rs  ◄─── basket, catalog snapshot, busy flag
//! ├── commands/       ◄─── basket, sale, catalog, journal operations
//! ├── finalizer.rs    ◄─── two-phase sale commit (ERP first, then journal)
//! ├── printer.rs      ◄─── receipt sinks (stdout, archive file)
//! ├── console.rs      ◄─── line-oriented register session on stdin
//! └── error.rs        ◄─── ApiError returned by every command
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Register Startup                                  │
//! │                                                                         │
//! │  1. Initialize Logging (stderr, RUST_LOG overrides the default filter) │
//! │  2. Load AppConfig (file, then environment)                            │
//! │  3. Open the SQLite database and run migrations                        │
//! │  4. Load the last synced catalog into the session                      │
//! │  5. Build the ERP client on demand (only commands that need it         │
//! │     validate the [erp] section; sign-in skips erp.company)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod console;
pub mod error;
pub mod finalizer;
pub mod printer;
pub mod state;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use d365pos_db::{Database, DbConfig};
use d365pos_sync::{
    CatalogSyncClient, CatalogSyncService, ErpAuth, ErpConfig, HttpErpClient,
    SalesRecordingClient, SignInService,
};

use error::{ApiError, ErrorCode};
use finalizer::SaleFinalizer;
use printer::{FileSink, ReceiptSink, StdoutSink, TeeSink};
use state::{AppConfig, SessionState};

/// An opened register: configuration, database and session.
pub struct Register {
    pub config: AppConfig,
    pub db: Database,
    pub session: Arc<SessionState>,
}

impl Register {
    /// Opens the database and loads the stored catalog into a new session.
    pub async fn open(config: AppConfig) -> Result<Self, ApiError> {
        let path = config.database_path().ok_or_else(|| {
            ApiError::new(
                ErrorCode::ConfigError,
                "Could not determine a database path, set database.path",
            )
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::internal(format!("Cannot create {:?}: {}", parent, e)))?;
        }

        let db = Database::new(DbConfig::new(&path)).await?;
        Self::with_database(config, db).await
    }

    /// Uses an already opened database.
    pub async fn with_database(config: AppConfig, db: Database) -> Result<Self, ApiError> {
        let catalog = db.catalog().load_catalog().await?;
        info!(
            products = catalog.product_count(),
            prices = catalog.price_count(),
            masks = catalog.masks().len(),
            "Catalog loaded"
        );

        Ok(Register {
            config,
            db,
            session: Arc::new(SessionState::new(catalog)),
        })
    }

    /// Builds the ERP client. Fails with `CONFIG_ERROR` when `[erp]` is incomplete.
    pub fn erp_client(&self) -> Result<Arc<HttpErpClient>, ApiError> {
        self.config.erp.validate()?;
        build_erp_client(&self.config.erp)
    }

    pub fn catalog_sync_service(&self, client: Arc<dyn CatalogSyncClient>) -> CatalogSyncService {
        CatalogSyncService::new(client, self.db.catalog(), self.config.store.store_id.clone())
    }

    pub fn finalizer(&self, sales: Arc<dyn SalesRecordingClient>) -> SaleFinalizer {
        SaleFinalizer::new(
            sales,
            Arc::new(self.db.clone()),
            self.receipt_sink(),
            &self.config,
        )
    }

    /// Stdout, plus the archive file when `receipt.archive_path` is set.
    pub fn receipt_sink(&self) -> Arc<dyn ReceiptSink> {
        match &self.config.receipt.archive_path {
            Some(path) => Arc::new(TeeSink::new(vec![
                Arc::new(StdoutSink),
                Arc::new(FileSink::new(path)),
            ])),
            None => Arc::new(StdoutSink),
        }
    }
}

/// Sign-in service for an unsigned register. Needs every `[erp]` setting
/// except `company`, which sign-in resolves.
pub fn sign_in_service(erp: &ErpConfig) -> Result<SignInService, ApiError> {
    erp.validate_connection()?;
    Ok(SignInService::new(build_erp_client(erp)?))
}

fn build_erp_client(erp: &ErpConfig) -> Result<Arc<HttpErpClient>, ApiError> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("d365pos/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ApiError::internal(format!("HTTP client setup failed: {}", e)))?;
    let auth = ErpAuth::with_client(erp.clone(), http.clone());

    Ok(Arc::new(HttpErpClient::new(erp.clone(), http, Arc::new(auth))))
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so receipts and `--json` output on stdout stay clean.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=d365pos=trace` - Show trace for the d365pos crates only
/// - Default: INFO, DEBUG for d365pos crates
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,d365pos=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
