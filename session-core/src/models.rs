use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access/refresh token pair issued by the backend on login, OAuth callback or refresh.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
        }
    }

    pub fn access(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh(&self) -> &str {
        self.refresh_token.expose_secret()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FamilyRole {
    Father,
    Mother,
    Son,
    Daughter,
    Grandfather,
    Grandmother,
}

impl FamilyRole {
    pub const ALL: [FamilyRole; 6] = [
        FamilyRole::Father,
        FamilyRole::Mother,
        FamilyRole::Son,
        FamilyRole::Daughter,
        FamilyRole::Grandfather,
        FamilyRole::Grandmother,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyRole::Father => "FATHER",
            FamilyRole::Mother => "MOTHER",
            FamilyRole::Son => "SON",
            FamilyRole::Daughter => "DAUGHTER",
            FamilyRole::Grandfather => "GRANDFATHER",
            FamilyRole::Grandmother => "GRANDMOTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for FamilyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user as returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: i64,
    pub nickname: String,
    #[serde(default)]
    pub family_id: Option<i64>,
    #[serde(default)]
    pub role: Option<FamilyRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: i64,
    pub nickname: String,
    #[serde(default)]
    pub role: Option<FamilyRole>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMembership {
    pub family_id: i64,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Result of a membership lookup. A user without a family is a normal state, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyLookup {
    Members(FamilyMembership),
    NoFamilyYet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: i64,
    pub name: String,
    pub invite_code: String,
}

/// Why the user was sent back to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginReason {
    TokenInvalid,
    UserNotFound,
    OAuthFail,
}

impl LoginReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginReason::TokenInvalid => "token-invalid",
            LoginReason::UserNotFound => "user-not-found",
            LoginReason::OAuthFail => "oauth-fail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "token-invalid" => Some(LoginReason::TokenInvalid),
            "user-not-found" => Some(LoginReason::UserNotFound),
            "oauth-fail" => Some(LoginReason::OAuthFail),
            _ => None,
        }
    }

    /// Message shown on the login page for this reason.
    pub fn user_message(&self) -> &'static str {
        match self {
            LoginReason::TokenInvalid => "Your session has expired. Please sign in again.",
            LoginReason::UserNotFound => {
                "We could not find your account. Please sign in again to create one."
            }
            LoginReason::OAuthFail => "Sign-in failed. Please try again in a moment.",
        }
    }
}

/// Where the navigation layer should take the user next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTarget {
    LoginPage(Option<LoginReason>),
    HomePage,
    FamilyCreationPage,
    RoleSelectionPage,
}

impl RouteTarget {
    pub fn path(&self) -> String {
        match self {
            RouteTarget::LoginPage(None) => "/login".to_string(),
            RouteTarget::LoginPage(Some(reason)) => format!("/login?reason={}", reason.as_str()),
            RouteTarget::HomePage => "/home".to_string(),
            RouteTarget::FamilyCreationPage => "/family/create".to_string(),
            RouteTarget::RoleSelectionPage => "/family/role".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapErrorKind {
    /// The token was accepted but the account behind it no longer exists.
    UserNotFound,
    /// Identity could not be verified for any other reason (transport, timeout, 5xx).
    IdentityUnavailable,
}

/// Decision produced by one bootstrap pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapResult {
    Unauthenticated {
        reason: Option<LoginReason>,
    },
    AuthenticatedNoFamily {
        user: UserIdentity,
    },
    AuthenticatedWithFamily {
        user: UserIdentity,
        membership: FamilyMembership,
    },
    Error(BootstrapErrorKind),
}

impl BootstrapResult {
    pub fn route(&self) -> RouteTarget {
        match self {
            BootstrapResult::Unauthenticated { reason } => RouteTarget::LoginPage(*reason),
            BootstrapResult::AuthenticatedNoFamily { .. } => RouteTarget::FamilyCreationPage,
            BootstrapResult::AuthenticatedWithFamily { .. } => RouteTarget::HomePage,
            BootstrapResult::Error(BootstrapErrorKind::UserNotFound) => {
                RouteTarget::LoginPage(Some(LoginReason::UserNotFound))
            }
            BootstrapResult::Error(BootstrapErrorKind::IdentityUnavailable) => {
                RouteTarget::LoginPage(Some(LoginReason::OAuthFail))
            }
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            BootstrapResult::Unauthenticated { .. } => "unauthenticated",
            BootstrapResult::AuthenticatedNoFamily { .. } => "authenticated_no_family",
            BootstrapResult::AuthenticatedWithFamily { .. } => "authenticated_with_family",
            BootstrapResult::Error(BootstrapErrorKind::UserNotFound) => "error_user_not_found",
            BootstrapResult::Error(BootstrapErrorKind::IdentityUnavailable) => {
                "error_identity_unavailable"
            }
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            BootstrapResult::AuthenticatedNoFamily { user }
            | BootstrapResult::AuthenticatedWithFamily { user, .. } => Some(user),
            _ => None,
        }
    }
}
