use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;
use crate::http::{ApiRequest, RefreshingClient};
use crate::models::UserIdentity;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Access token rejected")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Identity lookup failed: {0}")]
    Other(ApiError),
}

impl From<ApiError> for IdentityError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) | ApiError::SessionExpired(_) => {
                IdentityError::Unauthorized
            }
            ApiError::NotFound(_) => IdentityError::NotFound,
            other => IdentityError::Other(other),
        }
    }
}

/// Verifies an access token and returns the user it belongs to.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn get_current_user(&self, access_token: &str) -> Result<UserIdentity, IdentityError>;
}

pub struct HttpIdentityService {
    client: RefreshingClient,
}

impl HttpIdentityService {
    pub fn new(client: RefreshingClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn get_current_user(&self, access_token: &str) -> Result<UserIdentity, IdentityError> {
        let user: UserIdentity = self
            .client
            .execute_with_token(&ApiRequest::get("/users/me"), access_token)
            .await?;
        Ok(user)
    }
}
