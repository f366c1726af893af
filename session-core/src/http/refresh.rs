//! Token-refreshing wrapper around [`ApiClient`].
//!
//! Every authenticated call carries `Authorization: Bearer <access>`. A 401 on
//! the first attempt triggers one refresh with the stored refresh token and one
//! replay of the same request. A 401 on the replay is returned to the caller;
//! there is never a second retry.
//!
//! A failed refresh surfaces as [`ApiError::SessionExpired`] and changes
//! nothing else. Clearing the tokens and routing to login belongs to whoever
//! owns the logical operation, since that operation may have been cancelled
//! while the refresh was in flight.

use dashmap::DashMap;
use secrecy::Secret;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{ApiClient, ApiRequest};
use crate::error::ApiError;
use crate::models::TokenPair;
use crate::observability::new_request_id;
use crate::services::auth::AuthApi;
use crate::token_store::{TokenKey, TokenStore};

/// How long a rotated pair stays available to callers that sent the old token.
const ROTATION_GRACE: Duration = Duration::from_secs(30);

/// Retry bookkeeping for one logical request, owned by the call rather than
/// stored on shared client state.
#[derive(Debug)]
struct RequestAttempt {
    request_id: String,
    retried: bool,
}

impl RequestAttempt {
    fn new() -> Self {
        Self {
            request_id: new_request_id(),
            retried: false,
        }
    }
}

struct Rotation {
    pair: TokenPair,
    at: Instant,
}

type Slot = Arc<Mutex<Option<Rotation>>>;

/// Single-flight refresh shared by every client built with it.
///
/// Callers that were rejected with the same access token queue behind one
/// refresh. Those that get the slot afterwards reuse the rotated pair instead
/// of spending the old refresh token a second time, even when each caller
/// keeps its tokens in a separate store (one cookie session per request).
#[derive(Default)]
pub struct RefreshGate {
    slots: DashMap<String, Slot>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, stale_access: &str) -> Slot {
        self.prune();
        self.slots
            .entry(stale_access.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Forget slots nobody is waiting on, unless they hold a recent rotation.
    fn prune(&self) {
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(rotation) => rotation
                    .as_ref()
                    .is_some_and(|r| r.at.elapsed() < ROTATION_GRACE),
                Err(_) => true,
            }
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Clone)]
pub struct RefreshingClient {
    api: ApiClient,
    auth: AuthApi,
    tokens: Arc<dyn TokenStore>,
    gate: Arc<RefreshGate>,
}

impl RefreshingClient {
    pub fn new(api: ApiClient, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            auth: AuthApi::new(api.clone()),
            api,
            tokens,
            gate: Arc::new(RefreshGate::new()),
        }
    }

    /// Coordinate refreshes with every other client sharing `gate`.
    pub fn with_gate(mut self, gate: Arc<RefreshGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Send `request` with the access token currently in the store.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let token = self
            .tokens
            .get(TokenKey::Access)
            .await
            .map_err(ApiError::Storage)?;
        self.run(request, token).await
    }

    /// Send `request` with an explicit access token for the first attempt.
    pub async fn execute_with_token<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        access_token: &str,
    ) -> Result<T, ApiError> {
        self.run(request, Some(access_token.to_string())).await
    }

    /// Drop both tokens after an unrecoverable auth failure.
    pub async fn end_session(&self) {
        if let Err(e) = self.tokens.clear_all().await {
            tracing::error!(error = %e, "Failed to clear tokens after session expiry");
        }
    }

    async fn run<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        mut token: Option<String>,
    ) -> Result<T, ApiError> {
        let mut attempt = RequestAttempt::new();

        loop {
            match self
                .api
                .send::<T>(request, token.as_deref(), &attempt.request_id)
                .await
            {
                Err(ApiError::Unauthorized(message)) if !attempt.retried => {
                    attempt.retried = true;
                    warn!(
                        path = %request.path,
                        request_id = %attempt.request_id,
                        message = %message,
                        "Request unauthorized, refreshing access token"
                    );
                    token = Some(self.refresh_after(token.as_deref()).await?);
                }
                Err(ApiError::Unauthorized(message)) => {
                    warn!(
                        path = %request.path,
                        request_id = %attempt.request_id,
                        "Replayed request still unauthorized, giving up"
                    );
                    return Err(ApiError::Unauthorized(message));
                }
                result => {
                    if attempt.retried && result.is_ok() {
                        info!(
                            path = %request.path,
                            request_id = %attempt.request_id,
                            "Request succeeded after token refresh"
                        );
                    }
                    return result;
                }
            }
        }
    }

    /// Obtain a fresh access token after `stale` was rejected.
    async fn refresh_after(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let Some(stale) = stale else {
            return Ok(self.refresh().await?.access().to_string());
        };

        let slot = self.gate.slot(stale);
        let mut rotation = slot.lock().await;

        // Another clone over this store may have rotated while we waited.
        let current = self
            .tokens
            .get(TokenKey::Access)
            .await
            .map_err(ApiError::Storage)?;
        if let Some(current) = current
            && current != stale
        {
            debug!("Access token already rotated, replaying with stored token");
            return Ok(current);
        }

        if let Some(rotated) = rotation.as_ref() {
            debug!("Reusing token pair rotated by a concurrent request");
            self.tokens
                .store_pair(&rotated.pair)
                .await
                .map_err(ApiError::Storage)?;
            return Ok(rotated.pair.access().to_string());
        }

        let pair = self.refresh().await?;
        let access = pair.access().to_string();
        *rotation = Some(Rotation {
            pair,
            at: Instant::now(),
        });
        Ok(access)
    }

    async fn refresh(&self) -> Result<TokenPair, ApiError> {
        let refresh_token = match self.tokens.get(TokenKey::Refresh).await {
            Ok(Some(token)) => Secret::new(token),
            Ok(None) => return Err(session_expired("no refresh token stored")),
            Err(e) => return Err(session_expired(&e.to_string())),
        };

        match self.auth.refresh(&refresh_token).await {
            Ok(pair) => {
                self.tokens
                    .store_pair(&pair)
                    .await
                    .map_err(ApiError::Storage)?;
                info!("Access token refreshed");
                Ok(pair)
            }
            Err(e) => Err(session_expired(&e.to_string())),
        }
    }
}

fn session_expired(cause: &str) -> ApiError {
    warn!(cause = %cause, "Token refresh failed");
    ApiError::SessionExpired(cause.to_string())
}
