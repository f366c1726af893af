use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use session_core::RouteTarget;
use tower_sessions::Session;

use crate::{AppState, services::metrics::record_bootstrap};

/// App entry: run a bootstrap pass and send the browser wherever it resolved.
pub async fn index(State(state): State<AppState>, session: Session) -> Response {
    bootstrap_redirect(&state, session).await.into_response()
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub(crate) async fn bootstrap_redirect(state: &AppState, session: Session) -> Redirect {
    let services = state.session_services(session);
    let controller = services.bootstrap();

    let Some(result) = controller.run().await else {
        return Redirect::to(&RouteTarget::LoginPage(None).path());
    };

    record_bootstrap(result.label());
    services.remember_user(result.user()).await;
    services.persist_flash().await;

    services.redirect_or(result.route())
}
