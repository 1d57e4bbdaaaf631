//! # ERP Configuration
//!
//! Connection settings for the Dynamics 365 services: where the ERP lives,
//! which Azure AD application signs in, and how long each call may take.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     D365POS_ERP_RESOURCE=https://contoso.operations.dynamics.com       │
//! │     D365POS_ERP_CLIENT_SECRET=...                                      │
//! │                                                                         │
//! │  2. TOML Config File, [erp] section                                    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     token URL template, service paths, timeouts                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Config Section Format
//! ```toml
//! [erp]
//! resource = "https://contoso.operations.dynamics.com"
//! tenant_id = "00000000-0000-0000-0000-000000000000"
//! client_id = "pos-register"
//! client_secret = "..."
//! company = "usmf"
//! sales_timeout_secs = 30
//! catalog_timeout_secs = 15
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Placeholder replaced by the tenant id in `token_url`.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Environment variable prefix for ERP overrides.
pub const ENV_PREFIX: &str = "D365POS_ERP_";

// =============================================================================
// ERP Operations
// =============================================================================

/// Service operations the register calls.
///
/// Sales and catalog operations live on the POS operation service; the
/// sign-in lookups live on their own user and warehouse services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErpOperation {
    RecordSales,
    GetActiveProducts,
    GetActiveProductPrices,
    GetProductBarcodes,
    GetUser,
    GetStore,
}

impl ErpOperation {
    /// Operation name as it appears at the end of the service URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErpOperation::RecordSales => "recordSales",
            ErpOperation::GetActiveProducts => "getActiveProducts",
            ErpOperation::GetActiveProductPrices => "getActiveProductPrices",
            ErpOperation::GetProductBarcodes => "getProductBarcodes",
            ErpOperation::GetUser => "getUser",
            ErpOperation::GetStore => "getStore",
        }
    }
}

impl fmt::Display for ErpOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERP Config
// =============================================================================

/// Settings for talking to the ERP.
///
/// `Debug` redacts the client secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct ErpConfig {
    /// ERP environment base URL, also the OAuth resource.
    #[serde(default)]
    pub resource: String,

    /// Azure AD tenant id.
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Legal entity the register books into (e.g. "usmf"). Written by
    /// `d365pos sign-in`.
    #[serde(default)]
    pub company: String,

    /// Token endpoint; `{tenant}` is replaced by `tenant_id`.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Path of the POS operation service below `resource`.
    #[serde(default = "default_service_path")]
    pub service_path: String,

    /// Path of the user service that answers `getUser`.
    #[serde(default = "default_user_service_path")]
    pub user_service_path: String,

    /// Path of the warehouse service that answers `getStore`.
    #[serde(default = "default_store_service_path")]
    pub store_service_path: String,

    #[serde(default = "default_sales_timeout")]
    pub sales_timeout_secs: u64,

    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout_secs: u64,

    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
}

fn default_token_url() -> String {
    "https://login.windows.net/{tenant}/oauth2/token".to_string()
}

fn default_service_path() -> String {
    "api/services/TBInventoryServices/TBPOSOperationService".to_string()
}

fn default_user_service_path() -> String {
    "api/services/TBGetGlobalUserGroup/TBGetGlobalUserService".to_string()
}

fn default_store_service_path() -> String {
    "api/services/TBGetWarehouseGroup/TBGetWarehouseService".to_string()
}

fn default_sales_timeout() -> u64 {
    30
}

fn default_catalog_timeout() -> u64 {
    15
}

fn default_auth_timeout() -> u64 {
    10
}

impl Default for ErpConfig {
    fn default() -> Self {
        ErpConfig {
            resource: String::new(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            company: String::new(),
            token_url: default_token_url(),
            service_path: default_service_path(),
            user_service_path: default_user_service_path(),
            store_service_path: default_store_service_path(),
            sales_timeout_secs: default_sales_timeout(),
            catalog_timeout_secs: default_catalog_timeout(),
            auth_timeout_secs: default_auth_timeout(),
        }
    }
}

impl fmt::Debug for ErpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErpConfig")
            .field("resource", &self.resource)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("company", &self.company)
            .field("token_url", &self.token_url)
            .field("service_path", &self.service_path)
            .field("user_service_path", &self.user_service_path)
            .field("store_service_path", &self.store_service_path)
            .field("sales_timeout_secs", &self.sales_timeout_secs)
            .field("catalog_timeout_secs", &self.catalog_timeout_secs)
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .finish()
    }
}

impl ErpConfig {
    /// Validates the configuration.
    ///
    /// Every identifier must be present and both URLs must parse as http(s).
    pub fn validate(&self) -> SyncResult<()> {
        self.validate_connection()?;
        if self.company.trim().is_empty() {
            return Err(SyncError::MissingSetting("erp.company".to_string()));
        }
        Ok(())
    }

    /// Validates everything needed to reach the ERP, without `company`.
    ///
    /// Sign-in runs before the company is known.
    pub fn validate_connection(&self) -> SyncResult<()> {
        let required = [
            ("erp.resource", &self.resource),
            ("erp.tenant_id", &self.tenant_id),
            ("erp.client_id", &self.client_id),
            ("erp.client_secret", &self.client_secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::MissingSetting(name.to_string()));
            }
        }

        parse_http_url(&self.resource)?;
        parse_http_url(&self.token_endpoint())?;

        if self.sales_timeout_secs == 0
            || self.catalog_timeout_secs == 0
            || self.auth_timeout_secs == 0
        {
            return Err(SyncError::InvalidConfig(
                "ERP timeouts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `D365POS_ERP_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(resource) = var("RESOURCE") {
            debug!(resource = %resource, "Overriding ERP resource from environment");
            self.resource = resource;
        }
        if let Some(tenant) = var("TENANT_ID") {
            self.tenant_id = tenant;
        }
        if let Some(client_id) = var("CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Some(secret) = var("CLIENT_SECRET") {
            debug!("Overriding ERP client secret from environment");
            self.client_secret = secret;
        }
        if let Some(company) = var("COMPANY") {
            self.company = company;
        }
        if let Some(token_url) = var("TOKEN_URL") {
            self.token_url = token_url;
        }

        for (name, slot) in [
            ("SALES_TIMEOUT_SECS", &mut self.sales_timeout_secs),
            ("CATALOG_TIMEOUT_SECS", &mut self.catalog_timeout_secs),
            ("AUTH_TIMEOUT_SECS", &mut self.auth_timeout_secs),
        ] {
            if let Some(value) = var(name) {
                match value.parse::<u64>() {
                    Ok(secs) => *slot = secs,
                    Err(_) => debug!(key = name, value = %value, "Ignoring non-numeric timeout"),
                }
            }
        }
    }

    /// Token endpoint with the tenant filled in.
    pub fn token_endpoint(&self) -> String {
        self.token_url.replace(TENANT_PLACEHOLDER, &self.tenant_id)
    }

    /// Full URL of a service operation.
    ///
    /// ```text
    /// {resource}/{service_path}/{operation}
    ///             └─ user_service_path for getUser, store_service_path for getStore
    /// ```
    pub fn operation_url(&self, operation: ErpOperation) -> SyncResult<Url> {
        let service = match operation {
            ErpOperation::GetUser => &self.user_service_path,
            ErpOperation::GetStore => &self.store_service_path,
            _ => &self.service_path,
        };
        let base = self.resource.trim_end_matches('/');
        let path = service.trim_matches('/');
        let url = format!("{}/{}/{}", base, path, operation.as_str());
        parse_http_url(&url)
    }

    pub fn sales_timeout(&self) -> Duration {
        Duration::from_secs(self.sales_timeout_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    /// Also bounds the sign-in lookups.
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

fn parse_http_url(raw: &str) -> SyncResult<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::InvalidUrl(format!(
            "URL must start with http:// or https://, got scheme '{}' in {}",
            other, raw
        ))),
    }
}
