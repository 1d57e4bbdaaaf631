//! # ERP Authentication
//!
//! OAuth2 client-credentials sign-in against Azure AD, with an in-memory
//! token cache shared by every ERP call.
//!
//! ## Authentication Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ERP Authentication Flow                            │
//! │                                                                         │
//! │  ┌────────────────┐                         ┌─────────────────────┐    │
//! │  │  ErpAuth       │                         │  login.windows.net  │    │
//! │  └───────┬────────┘                         └──────────┬──────────┘    │
//! │          │                                             │               │
//! │          │  1. POST /{tenant}/oauth2/token (form)      │               │
//! │          │     client_id, client_secret,               │               │
//! │          │     grant_type=client_credentials, resource │               │
//! │          │────────────────────────────────────────────►│               │
//! │          │                                             │               │
//! │          │  2. { token_type, access_token, expires_in }│               │
//! │          │◄────────────────────────────────────────────│               │
//! │          │                                             │               │
//! │          │  [Cached until 60 s before expiry]          │               │
//! │          │                                             │               │
//! │          │  3. Next call inside the margin: sign in again              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Client-credentials grants carry no refresh token, so "refresh" is simply a
//! new sign-in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Deserializer};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ErpConfig;
use crate::error::{SyncError, SyncResult};

/// Margin before token expiration that triggers a new sign-in.
const REFRESH_MARGIN_SECS: u64 = 60;

/// Cached access token.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: String,

    /// Usually "Bearer".
    pub token_type: String,

    /// When the token expires (local clock).
    pub expires_at: Instant,
}

impl TokenInfo {
    /// True when the token is expired or inside the refresh margin.
    pub fn needs_refresh(&self) -> bool {
        Instant::now() + Duration::from_secs(REFRESH_MARGIN_SECS) >= self.expires_at
    }

    /// True when the token is expired outright.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn remaining_secs(&self) -> u64 {
        self.expires_at
            .saturating_duration_since(Instant::now())
            .as_secs()
    }
}

/// Source of bearer tokens for ERP calls.
#[automock]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A valid access token, signing in when the cached one is stale.
    async fn access_token(&self) -> SyncResult<String>;
}

// =============================================================================
// Token Endpoint DTOs
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token_type: Option<String>,
    access_token: Option<String>,
    #[serde(default, deserialize_with = "seconds_from_string_or_number")]
    expires_in: Option<u64>,
}

/// Azure AD v1 endpoints send `expires_in` as a string; v2 sends a number.
fn seconds_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(secs)) => Ok(Some(secs)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// ErpAuth
// =============================================================================

/// Token cache for the ERP service principal.
pub struct ErpAuth {
    config: ErpConfig,
    http: reqwest::Client,
    token: Arc<RwLock<Option<TokenInfo>>>,
}

impl ErpAuth {
    pub fn new(config: ErpConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Uses an existing HTTP client (connection pool shared with the ERP calls).
    pub fn with_client(config: ErpConfig, http: reqwest::Client) -> Self {
        ErpAuth {
            config,
            http,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Current token info without triggering a sign-in.
    pub async fn current_token(&self) -> Option<TokenInfo> {
        self.token.read().await.clone()
    }

    /// Drops the cached token; the next call signs in again.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
        debug!("ERP token cache cleared");
    }

    /// Gets a cached token or signs in.
    ///
    /// ## Flow
    /// 1. Cached and outside the refresh margin: return it
    /// 2. Otherwise take the write lock, re-check, then sign in
    pub async fn get_token(&self) -> SyncResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !token.needs_refresh() {
                    debug!(remaining_secs = token.remaining_secs(), "Using cached ERP token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;

        // Another caller may have signed in while we waited.
        if let Some(token) = guard.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
            if token.is_expired() {
                debug!("Cached ERP token expired");
            }
        }

        let fresh = self.sign_in().await?;
        info!(
            expires_in_secs = fresh.remaining_secs(),
            token_type = %fresh.token_type,
            "Signed in to ERP"
        );
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    async fn sign_in(&self) -> SyncResult<TokenInfo> {
        let endpoint = self.config.token_endpoint();
        debug!(endpoint = %endpoint, client_id = %self.config.client_id, "Requesting ERP token");

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("resource", self.config.resource.as_str()),
        ];

        let response = self
            .http
            .post(&endpoint)
            .timeout(self.config.auth_timeout())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "ERP token request rejected");
            return Err(SyncError::AuthFailed(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::AuthFailed(format!("unreadable token response: {}", e)))?;

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::AuthFailed("token response has no access_token".into()))?;
        let expires_in = body.expires_in.unwrap_or(0);

        Ok(TokenInfo {
            access_token,
            token_type: body.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for ErpAuth {
    async fn access_token(&self) -> SyncResult<String> {
        self.get_token().await
    }
}
