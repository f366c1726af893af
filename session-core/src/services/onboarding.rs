//! Family creation/joining and role selection, the two steps a user without a
//! family goes through after bootstrap. Each step is create-then-navigate; on
//! failure the caller shows `user_message()` and lets the user retry.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

use crate::error::ApiError;
use crate::http::{ApiRequest, RefreshingClient};
use crate::models::{Family, FamilyRole, LoginReason, RouteTarget, UserIdentity};
use crate::navigation::Navigator;

#[derive(Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFamilyRequest {
    #[validate(length(min = 1, max = 20, message = "Family name must be 1 to 20 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinFamilyRequest {
    #[validate(length(min = 6, max = 12, message = "Invite code must be 6 to 12 characters"))]
    pub invite_code: String,
}

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Family name already exists")]
    DuplicateName,

    #[error("Role already taken in this family")]
    RoleTaken,

    #[error("Already a member of a family")]
    AlreadyInFamily,

    #[error("Invite code not found")]
    InviteNotFound,

    #[error("User no longer exists")]
    UserNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(ApiError),
}

impl OnboardingError {
    /// Message suitable for an inline form error or toast.
    pub fn user_message(&self) -> String {
        match self {
            OnboardingError::Validation(errors) => errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Please check your input.".to_string()),
            OnboardingError::InvalidInput(message) => message.clone(),
            OnboardingError::DuplicateName => {
                "That family name is already in use. Try another one.".to_string()
            }
            OnboardingError::RoleTaken => {
                "Someone in your family already has that role.".to_string()
            }
            OnboardingError::AlreadyInFamily => "You already belong to a family.".to_string(),
            OnboardingError::InviteNotFound => {
                "We could not find a family with that invite code.".to_string()
            }
            OnboardingError::UserNotFound => {
                "Your account could not be found. Please sign in again.".to_string()
            }
            OnboardingError::SessionExpired => {
                "Your session has expired. Please sign in again.".to_string()
            }
            OnboardingError::ServerError(_) | OnboardingError::Unavailable(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    fn from_api(err: ApiError, conflict: OnboardingError, not_found: OnboardingError) -> Self {
        match err {
            ApiError::Conflict(_) => conflict,
            ApiError::NotFound(_) => not_found,
            ApiError::BadRequest(message) => OnboardingError::InvalidInput(message),
            ApiError::Unauthorized(_) | ApiError::SessionExpired(_) => {
                OnboardingError::SessionExpired
            }
            ApiError::Server(message) => OnboardingError::ServerError(message),
            other => OnboardingError::Unavailable(other),
        }
    }
}

pub struct FamilyOnboarding {
    client: RefreshingClient,
    navigator: Arc<dyn Navigator>,
}

impl FamilyOnboarding {
    pub fn new(client: RefreshingClient, navigator: Arc<dyn Navigator>) -> Self {
        Self { client, navigator }
    }

    /// Create a new family and continue to role selection.
    pub async fn create_family(&self, name: &str) -> Result<Family, OnboardingError> {
        let request = CreateFamilyRequest {
            name: name.trim().to_string(),
        };
        request.validate()?;

        let family: Family = match self
            .client
            .execute(&ApiRequest::post("/families", json!(request)))
            .await
        {
            Ok(family) => family,
            Err(e) => {
                let err = OnboardingError::from_api(
                    e,
                    OnboardingError::DuplicateName,
                    OnboardingError::UserNotFound,
                );
                return Err(self.failed(err).await);
            }
        };

        tracing::info!(family_id = family.id, "Family created");
        self.navigator.route_to(RouteTarget::RoleSelectionPage);
        Ok(family)
    }

    /// Join an existing family by invite code and continue to role selection.
    pub async fn join_family(&self, invite_code: &str) -> Result<Family, OnboardingError> {
        let request = JoinFamilyRequest {
            invite_code: invite_code.trim().to_uppercase(),
        };
        request.validate()?;
        if !request.invite_code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(OnboardingError::InvalidInput(
                "Invite code may only contain letters and digits".to_string(),
            ));
        }

        let family: Family = match self
            .client
            .execute(&ApiRequest::post("/families/join", json!(request)))
            .await
        {
            Ok(family) => family,
            Err(e) => {
                let err = OnboardingError::from_api(
                    e,
                    OnboardingError::AlreadyInFamily,
                    OnboardingError::InviteNotFound,
                );
                return Err(self.failed(err).await);
            }
        };

        tracing::info!(family_id = family.id, "Joined family");
        self.navigator.route_to(RouteTarget::RoleSelectionPage);
        Ok(family)
    }

    /// Pick the user's role in their family and continue to the home page.
    pub async fn set_role(&self, role: FamilyRole) -> Result<UserIdentity, OnboardingError> {
        let user: UserIdentity = match self
            .client
            .execute(&ApiRequest::put("/users/me/role", json!({ "role": role })))
            .await
        {
            Ok(user) => user,
            Err(e) => {
                let err = OnboardingError::from_api(
                    e,
                    OnboardingError::RoleTaken,
                    OnboardingError::UserNotFound,
                );
                return Err(self.failed(err).await);
            }
        };

        tracing::info!(user_id = user.id, role = %role, "Family role set");
        self.navigator.route_to(RouteTarget::HomePage);
        Ok(user)
    }

    /// A lost session ends the flow: tokens cleared, user back at login.
    async fn failed(&self, err: OnboardingError) -> OnboardingError {
        if matches!(err, OnboardingError::SessionExpired) {
            tracing::warn!("Session expired during onboarding");
            self.client.end_session().await;
            self.navigator
                .route_to(RouteTarget::LoginPage(Some(LoginReason::TokenInvalid)));
        }
        err
    }
}
