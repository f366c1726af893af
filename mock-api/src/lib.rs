//! In-memory stand-in for the DearFam backend, used for local development and workflow tests.
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use session_core::middleware::request_id_middleware;
use tower_http::trace::TraceLayer;

pub use crate::state::MockState;

pub fn build_router(state: MockState) -> Router {
    let protected = Router::new()
        .route("/users/me", get(handlers::get_me))
        .route("/users/me/role", put(handlers::set_role))
        .route("/family/members", get(handlers::members))
        .route("/families", post(handlers::create_family))
        .route("/families/join", post(handlers::join_family))
        .route("/auth/logout", post(handlers::logout))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let api = Router::new()
        .route("/auth/oauth/callback", post(handlers::oauth_callback))
        .route("/auth/refresh", post(handlers::refresh))
        .merge(protected);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "mock-api" }))
}
