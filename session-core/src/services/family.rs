use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;
use crate::http::{ApiRequest, RefreshingClient};
use crate::models::{FamilyLookup, FamilyMembership};

/// A membership lookup that failed for a reason other than "no family yet".
#[derive(Debug, Error)]
pub enum FamilyError {
    #[error("Session expired during family lookup")]
    SessionExpired,

    #[error("Family lookup failed: {0}")]
    Other(ApiError),
}

#[async_trait]
pub trait FamilyMembershipService: Send + Sync {
    async fn get_members(&self, access_token: &str) -> Result<FamilyLookup, FamilyError>;
}

pub struct HttpFamilyService {
    client: RefreshingClient,
}

impl HttpFamilyService {
    pub fn new(client: RefreshingClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FamilyMembershipService for HttpFamilyService {
    async fn get_members(&self, access_token: &str) -> Result<FamilyLookup, FamilyError> {
        let result = self
            .client
            .execute_with_token::<FamilyMembership>(
                &ApiRequest::get("/family/members"),
                access_token,
            )
            .await;

        match result {
            Ok(membership) if membership.members.is_empty() => Ok(FamilyLookup::NoFamilyYet),
            Ok(membership) => Ok(FamilyLookup::Members(membership)),
            // The backend answers 404 for a user who has not joined a family.
            Err(ApiError::NotFound(_)) => Ok(FamilyLookup::NoFamilyYet),
            Err(ApiError::SessionExpired(_)) => Err(FamilyError::SessionExpired),
            Err(e) => Err(FamilyError::Other(e)),
        }
    }
}
