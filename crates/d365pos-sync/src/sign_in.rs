//! # Operator Sign-In
//!
//! Resolves which company and store a register belongs to from the
//! operator's ERP credentials.
//!
//! ```text
//! getUser(user, password) ──► Status == Success? ──► first CompanyList entry
//!                                                          │
//! getStore(user, company) ──► Status == Success? ──► first Warehouse entry
//!                                                          │
//!                                                          ▼
//!                                       RegisterIdentity { user, company, store }
//! ```
//!
//! A non-success status becomes [`SyncError::SignInRejected`] carrying the
//! ERP's message ("Unknown error" when it sent none). The password is never
//! logged.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::SignInClient;
use crate::error::{SyncError, SyncResult};

const UNKNOWN_ERROR: &str = "Unknown error";

/// Where a signed-in operator works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterIdentity {
    pub user_id: String,
    pub company: String,
    pub store_id: String,
}

pub struct SignInService {
    client: Arc<dyn SignInClient>,
}

impl SignInService {
    pub fn new(client: Arc<dyn SignInClient>) -> Self {
        SignInService { client }
    }

    pub async fn sign_in(&self, user_id: &str, password: &str) -> SyncResult<RegisterIdentity> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SyncError::SignInRejected("User id is required".into()));
        }

        let user = self.client.get_user(user_id, password).await?;
        if !user.is_success() {
            warn!(user_id = %user_id, "ERP rejected the user");
            return Err(rejected(user.message));
        }
        let company = user.first_company().ok_or_else(|| {
            SyncError::SignInRejected(format!("No company is assigned to user {}", user_id))
        })?;

        let store = self.client.get_store(user_id, &company).await?;
        if !store.is_success() {
            warn!(user_id = %user_id, company = %company, "ERP store lookup failed");
            return Err(rejected(store.message));
        }
        let store_id = store.first_store().ok_or_else(|| {
            SyncError::SignInRejected(format!(
                "No store is assigned to user {} in {}",
                user_id, company
            ))
        })?;

        info!(user_id = %user_id, company = %company, store_id = %store_id, "Operator signed in");

        Ok(RegisterIdentity {
            user_id: user_id.to_string(),
            company,
            store_id,
        })
    }
}

fn rejected(message: Option<String>) -> SyncError {
    let message = message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
    SyncError::SignInRejected(message)
}
