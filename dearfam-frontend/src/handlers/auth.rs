use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use session_core::reqwest::Url;
use session_core::services::AuthApi;
use session_core::{LoginReason, RouteTarget, TokenKey, TokenStore};
use tower_sessions::Session;

use crate::handlers::app::bootstrap_redirect;
use crate::session::{OAUTH_STATE_KEY, SessionTokenStore, take_flash};
use crate::AppState;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub messages: Vec<String>,
}

#[derive(Deserialize)]
pub struct LoginQuery {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn login_page(Query(query): Query<LoginQuery>, session: Session) -> impl IntoResponse {
    let mut messages = take_flash(&session).await;

    if let Some(reason) = query.reason.as_deref().and_then(LoginReason::parse)
        && !messages.iter().any(|m| m == reason.user_message())
    {
        messages.push(reason.user_message().to_string());
    }

    LoginTemplate { messages }
}

/// Start the provider's authorization-code flow.
pub async fn oauth_redirect(State(state): State<AppState>, session: Session) -> Response {
    let csrf_state = uuid::Uuid::new_v4().to_string();
    if let Err(e) = session.insert(OAUTH_STATE_KEY, &csrf_state).await {
        tracing::error!(error = %e, "Failed to store OAuth state");
        return oauth_failed();
    }

    let url = Url::parse_with_params(
        &state.oauth.authorize_url,
        &[
            ("response_type", "code"),
            ("client_id", state.oauth.client_id.as_str()),
            ("redirect_uri", state.oauth.redirect_uri.as_str()),
            ("state", csrf_state.as_str()),
        ],
    );

    match url {
        Ok(url) => {
            tracing::info!("Redirecting to OAuth provider");
            Redirect::to(url.as_str()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid OAuth authorize URL");
            oauth_failed()
        }
    }
}

/// Exchange the authorization code for tokens, then bootstrap as on app entry.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
    session: Session,
) -> Response {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth provider returned an error");
        return oauth_failed();
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!("OAuth callback without code");
        return oauth_failed();
    };

    let expected: Option<String> = session
        .remove(OAUTH_STATE_KEY)
        .await
        .unwrap_or(None);
    match expected {
        Some(expected) if params.state.as_deref() != Some(expected.as_str()) => {
            tracing::warn!("OAuth state mismatch");
            return oauth_failed();
        }
        None if !state.oauth.allow_direct_callback => {
            tracing::warn!("OAuth callback without a flow started by this session");
            return oauth_failed();
        }
        _ => {}
    }

    let auth = AuthApi::new(state.api.clone());
    let tokens = match auth.exchange_code(&code, params.state.as_deref()).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth code exchange failed");
            return oauth_failed();
        }
    };

    if let Err(e) = SessionTokenStore::new(session.clone())
        .store_pair(&tokens)
        .await
    {
        tracing::error!(error = %e, "Failed to store session tokens");
        return oauth_failed();
    }

    bootstrap_redirect(&state, session).await.into_response()
}

/// Best-effort server logout; the local session is cleared either way.
pub async fn logout_handler(State(state): State<AppState>, session: Session) -> Response {
    let access_token = SessionTokenStore::new(session.clone())
        .get(TokenKey::Access)
        .await
        .unwrap_or(None);

    if let Some(access_token) = access_token {
        match AuthApi::new(state.api.clone()).logout(&access_token).await {
            Ok(()) => tracing::info!("Session revoked"),
            Err(e) => tracing::warn!(error = %e, "Failed to revoke session during logout"),
        }
    }

    if let Err(e) = session.flush().await {
        tracing::error!(error = %e, "Failed to flush session");
    }

    Redirect::to("/").into_response()
}

fn oauth_failed() -> Response {
    Redirect::to(&RouteTarget::LoginPage(Some(LoginReason::OAuthFail)).path()).into_response()
}
