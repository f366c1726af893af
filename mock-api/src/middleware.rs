use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::MockState};

/// The user behind the request's bearer token.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

/// Bearer token of the request, kept so logout can revoke it.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

pub async fn auth_middleware(
    State(state): State<MockState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

    let user_id = state.user_for_access_token(&token)?;

    req.extensions_mut().insert(CurrentUser(user_id));
    req.extensions_mut().insert(BearerToken(token));

    Ok(next.run(req).await)
}
