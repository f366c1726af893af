use askama::Template;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use session_core::RouteTarget;
use session_core::models::FamilyRole;
use session_core::services::OnboardingError;
use tower_sessions::Session;

use crate::AppState;
use crate::session::SessionServices;

#[derive(Template)]
#[template(path = "family_create.html")]
pub struct FamilyCreateTemplate {
    pub error: Option<String>,
    pub name: String,
    pub invite_code: String,
}

#[derive(Template)]
#[template(path = "family_role.html")]
pub struct FamilyRoleTemplate {
    pub error: Option<String>,
    pub roles: Vec<&'static str>,
}

impl FamilyRoleTemplate {
    fn new(error: Option<String>) -> Self {
        Self {
            error,
            roles: FamilyRole::ALL.iter().map(|r| r.as_str()).collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateFamilyForm {
    pub name: String,
}

#[derive(Deserialize)]
pub struct JoinFamilyForm {
    pub invite_code: String,
}

#[derive(Deserialize)]
pub struct RoleForm {
    pub role: String,
}

pub async fn create_page() -> impl IntoResponse {
    FamilyCreateTemplate {
        error: None,
        name: String::new(),
        invite_code: String::new(),
    }
}

pub async fn create_family(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CreateFamilyForm>,
) -> Response {
    let services = state.session_services(session);
    match services.onboarding().create_family(&form.name).await {
        Ok(_) => services.redirect_or(RouteTarget::RoleSelectionPage).into_response(),
        Err(e) => onboarding_failed(&services, e, |message| FamilyCreateTemplate {
            error: Some(message),
            name: form.name.clone(),
            invite_code: String::new(),
        }),
    }
}

pub async fn join_family(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<JoinFamilyForm>,
) -> Response {
    let services = state.session_services(session);
    match services.onboarding().join_family(&form.invite_code).await {
        Ok(_) => services.redirect_or(RouteTarget::RoleSelectionPage).into_response(),
        Err(e) => onboarding_failed(&services, e, |message| FamilyCreateTemplate {
            error: Some(message),
            name: String::new(),
            invite_code: form.invite_code.clone(),
        }),
    }
}

pub async fn role_page() -> impl IntoResponse {
    FamilyRoleTemplate::new(None)
}

pub async fn set_role(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RoleForm>,
) -> Response {
    let Some(role) = FamilyRole::parse(&form.role) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            FamilyRoleTemplate::new(Some("Please pick one of the listed roles.".to_string())),
        )
            .into_response();
    };

    let services = state.session_services(session);
    match services.onboarding().set_role(role).await {
        Ok(user) => {
            services.remember_user(Some(&user)).await;
            services.redirect_or(RouteTarget::HomePage).into_response()
        }
        Err(e) => {
            onboarding_failed(&services, e, |message| FamilyRoleTemplate::new(Some(message)))
        }
    }
}

/// Re-render the form with the error, unless the session itself is gone.
fn onboarding_failed<T, F>(
    services: &SessionServices,
    error: OnboardingError,
    render: F,
) -> Response
where
    T: IntoResponse,
    F: FnOnce(String) -> T,
{
    if services.session_expired() {
        return services
            .redirect_or(RouteTarget::LoginPage(None))
            .into_response();
    }

    tracing::info!(error = %error, "Onboarding step rejected");
    (StatusCode::UNPROCESSABLE_ENTITY, render(error.user_message())).into_response()
}
