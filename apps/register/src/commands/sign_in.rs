//! # Sign-In Command
//!
//! Binds the register to the operator's company and store.

use serde::Serialize;
use tracing::info;

use d365pos_sync::SignInService;

use crate::error::ApiError;
use crate::state::AppConfig;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user_id: String,
    pub company: String,
    pub store_id: String,
}

/// Resolves the operator's company and store and writes them into `config`.
///
/// `config` is left untouched when the ERP rejects the sign-in.
pub async fn sign_in(
    service: &SignInService,
    config: &mut AppConfig,
    user_id: &str,
    password: &str,
) -> Result<SignInResponse, ApiError> {
    if password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let identity = service.sign_in(user_id, password).await?;
    config.apply_sign_in(&identity);
    info!(store_id = %identity.store_id, company = %identity.company, "Register bound to store");

    Ok(SignInResponse {
        user_id: identity.user_id,
        company: identity.company,
        store_id: identity.store_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use d365pos_sync::{MockSignInClient, StoreResponse, UserResponse};
    use std::sync::Arc;

    fn accepting_client() -> MockSignInClient {
        let mut client = MockSignInClient::new();
        client.expect_get_user().returning(|_, _| {
            Ok(UserResponse {
                status: Some("Success".into()),
                message: None,
                company_list: Some(vec!["usmf".into()]),
            })
        });
        client.expect_get_store().returning(|_, _| {
            Ok(StoreResponse {
                status: Some("Success".into()),
                message: None,
                warehouse: Some(vec!["S001".into()]),
            })
        });
        client
    }

    #[tokio::test]
    async fn test_sign_in_writes_company_and_store() {
        let service = SignInService::new(Arc::new(accepting_client()));
        let mut config = AppConfig::default();
        config.store.terminal_id = "T01".into();

        let response = sign_in(&service, &mut config, "000160", "pa55").await.unwrap();

        assert_eq!(response.company, "usmf");
        assert_eq!(response.store_id, "S001");
        assert_eq!(config.erp.company, "usmf");
        assert_eq!(config.store.store_id, "S001");
        assert_eq!(config.store.staff_id, "000160");
    }

    #[tokio::test]
    async fn test_rejected_sign_in_leaves_config_alone() {
        let mut client = MockSignInClient::new();
        client.expect_get_user().returning(|_, _| {
            Ok(UserResponse {
                status: Some("Failed".into()),
                message: Some("Invalid password".into()),
                company_list: None,
            })
        });
        let service = SignInService::new(Arc::new(client));
        let mut config = AppConfig::default();
        config.erp.company = "dat".into();

        let err = sign_in(&service, &mut config, "000160", "wrong")
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::BusinessLogic);
        assert!(err.message.contains("Invalid password"));
        assert_eq!(config.erp.company, "dat");
        assert!(config.store.store_id.is_empty());
    }

    #[tokio::test]
    async fn test_empty_password_is_not_sent() {
        let mut client = MockSignInClient::new();
        client.expect_get_user().never();
        let service = SignInService::new(Arc::new(client));

        let err = sign_in(&service, &mut AppConfig::default(), "000160", "")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
