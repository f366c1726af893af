use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use secrecy::ExposeSecret;
use session_core::middleware::request_id_middleware;
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::Key;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::AppState;
use crate::config::ServerSettings;
use crate::handlers::{
    app::{health_check, index},
    auth::{login_page, logout_handler, oauth_callback, oauth_redirect},
    family::{create_family, create_page, join_family, role_page, set_role},
    home::home_page,
};
use crate::middleware::{auth::auth_middleware, metrics::metrics_middleware};

/// Derive the cookie signing key from the configured session secret.
pub fn session_key(server: &ServerSettings) -> anyhow::Result<Key> {
    Key::try_from(server.session_secret.expose_secret().as_bytes())
        .map_err(|e| anyhow::anyhow!("session_secret must be at least 64 bytes: {}", e))
}

pub fn build_router(state: AppState, session_key: Key) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_signed(session_key)
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    let protected = Router::new()
        .route("/home", get(home_page))
        .route("/family/create", get(create_page).post(create_family))
        .route("/family/join", post(join_family))
        .route("/family/role", get(role_page).post(set_role))
        .layer(from_fn(auth_middleware));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(crate::handlers::metrics::metrics))
        .route("/login", get(login_page))
        .route("/auth/oauth", get(oauth_redirect))
        .route("/auth/oauth/callback", get(oauth_callback))
        .route("/logout", get(logout_handler))
        .merge(protected)
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
