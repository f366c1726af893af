use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use session_core::TokenKey;
use tower_sessions::Session;

/// Send visitors without an access token in their session to the login page.
pub async fn auth_middleware(session: Session, request: Request<Body>, next: Next) -> Response {
    let access_token: Option<String> = session
        .get(TokenKey::Access.as_str())
        .await
        .unwrap_or(None);

    if access_token.is_none() {
        tracing::debug!(path = %request.uri().path(), "No session token, redirecting to login");
        return Redirect::to("/login").into_response();
    }

    next.run(request).await
}
