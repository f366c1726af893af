use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use session_core::models::{FamilyLookup, Member};
use session_core::services::{FamilyError, FamilyMembershipService, HttpFamilyService};
use session_core::{LoginReason, RouteTarget, TokenKey, TokenStore};
use tower_sessions::Session;

use crate::AppState;
use crate::session::{cached_user, take_flash};

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nickname: String,
    pub role: Option<String>,
    pub members: Vec<Member>,
    pub messages: Vec<String>,
}

pub async fn home_page(State(state): State<AppState>, session: Session) -> Response {
    // The identity is cached by the bootstrap pass; without it, bootstrap again.
    let Some(user) = cached_user(&session).await else {
        return Redirect::to("/").into_response();
    };

    let services = state.session_services(session.clone());
    let token = services
        .tokens
        .get(TokenKey::Access)
        .await
        .unwrap_or(None)
        .unwrap_or_default();

    let members = match HttpFamilyService::new(services.client.clone())
        .get_members(&token)
        .await
    {
        Ok(FamilyLookup::Members(membership)) => membership.members,
        Ok(FamilyLookup::NoFamilyYet) => Vec::new(),
        Err(FamilyError::SessionExpired) => {
            tracing::warn!(user_id = user.id, "Session expired on home page");
            services.client.end_session().await;
            services.remember_user(None).await;
            let login = RouteTarget::LoginPage(Some(LoginReason::TokenInvalid));
            return Redirect::to(&login.path()).into_response();
        }
        Err(e) => {
            tracing::warn!(user_id = user.id, error = %e, "Family lookup failed on home page");
            Vec::new()
        }
    };

    HomeTemplate {
        nickname: user.nickname,
        role: user.role.map(|r| r.to_string()),
        members,
        messages: take_flash(&session).await,
    }
    .into_response()
}
