use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use session_core::http::ApiEnvelope;
use session_core::models::{FamilyRole, UserIdentity};

use crate::{error::AppError, middleware::CurrentUser, state::MockState};

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

pub async fn get_me(
    State(state): State<MockState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<ApiEnvelope<UserIdentity>>, AppError> {
    let user = state.current_user(user_id)?;
    Ok(Json(ApiEnvelope::ok(user)))
}

pub async fn set_role(
    State(state): State<MockState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<ApiEnvelope<UserIdentity>>, AppError> {
    let role = FamilyRole::parse(&req.role)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown role: {}", req.role)))?;
    let user = state.set_role(user_id, role)?;
    Ok(Json(ApiEnvelope::ok(user)))
}
