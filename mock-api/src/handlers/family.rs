use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::Deserialize;
use session_core::http::ApiEnvelope;
use session_core::models::{Family, FamilyMembership};

use crate::{error::AppError, middleware::CurrentUser, state::MockState};

#[derive(Debug, Deserialize)]
pub struct CreateFamilyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinFamilyRequest {
    pub invite_code: String,
}

/// Members of the caller's family. 404 when the caller has none.
pub async fn members(
    State(state): State<MockState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<ApiEnvelope<FamilyMembership>>, AppError> {
    let membership = state.members(user_id)?;
    Ok(Json(ApiEnvelope::ok(membership)))
}

pub async fn create_family(
    State(state): State<MockState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateFamilyRequest>,
) -> Result<(StatusCode, Json<ApiEnvelope<Family>>), AppError> {
    let family = state.create_family(user_id, &req.name)?;
    Ok((StatusCode::CREATED, Json(ApiEnvelope::ok(family))))
}

pub async fn join_family(
    State(state): State<MockState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<JoinFamilyRequest>,
) -> Result<Json<ApiEnvelope<Family>>, AppError> {
    let family = state.join_family(user_id, req.invite_code.trim())?;
    tracing::info!(family_id = family.id, user_id, "Mock user joined family");
    Ok(Json(ApiEnvelope::ok(family)))
}
