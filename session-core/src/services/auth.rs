use secrecy::{ExposeSecret, Secret};
use serde_json::json;

use crate::error::ApiError;
use crate::http::{ApiClient, ApiRequest};
use crate::models::TokenPair;
use crate::observability::new_request_id;

/// Token lifecycle endpoints. These never go through the refresh wrapper.
#[derive(Clone)]
pub struct AuthApi {
    api: ApiClient,
}

impl AuthApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchange an OAuth authorization code for a token pair.
    pub async fn exchange_code(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> Result<TokenPair, ApiError> {
        let request = ApiRequest::post(
            "/auth/oauth/callback",
            json!({ "code": code, "state": state }),
        );
        let tokens: TokenPair = self.api.send(&request, None, &new_request_id()).await?;
        tracing::info!("OAuth code exchanged for session tokens");
        Ok(tokens)
    }

    pub async fn refresh(&self, refresh_token: &Secret<String>) -> Result<TokenPair, ApiError> {
        let request = ApiRequest::post(
            "/auth/refresh",
            json!({ "refreshToken": refresh_token.expose_secret() }),
        );
        self.api.send(&request, None, &new_request_id()).await
    }

    /// Revoke the session server-side. Callers clear local tokens regardless of the outcome.
    pub async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/auth/logout", json!({}));
        self.api
            .send::<()>(&request, Some(access_token), &new_request_id())
            .await
    }
}
