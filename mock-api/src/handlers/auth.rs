use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use session_core::http::ApiEnvelope;

use crate::{
    error::AppError,
    middleware::BearerToken,
    state::{MockState, TokenResponse},
};

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    pub code: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn oauth_callback(
    State(state): State<MockState>,
    Json(req): Json<OAuthCallbackRequest>,
) -> Result<Json<ApiEnvelope<TokenResponse>>, AppError> {
    let tokens = state.exchange_code(req.code.trim())?;
    tracing::info!(has_state = req.state.is_some(), "OAuth code exchanged");
    Ok(Json(ApiEnvelope::ok(tokens)))
}

pub async fn refresh(
    State(state): State<MockState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiEnvelope<TokenResponse>>, AppError> {
    let tokens = state.refresh(&req.refresh_token)?;
    tracing::debug!("Refresh token rotated");
    Ok(Json(ApiEnvelope::ok(tokens)))
}

pub async fn logout(
    State(state): State<MockState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Json<ApiEnvelope<()>> {
    state.logout(&token);
    Json(ApiEnvelope::ok(()))
}
