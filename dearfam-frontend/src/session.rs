//! Glue between a browser's cookie session and the session-core services.
//!
//! Every request builds a fresh [`SessionServices`] over its own session, so
//! tokens, the cached identity and flash messages all live in the cookie-keyed store.
//! Refreshes go through the process-wide [`RefreshGate`], so parallel requests
//! from one browser spend its refresh token once.

use async_trait::async_trait;
use axum::response::Redirect;
use session_core::http::{ApiClient, RefreshGate, RefreshingClient};
use session_core::models::{RouteTarget, UserIdentity};
use session_core::navigation::{RecordingNavigator, RecordingNotifier};
use session_core::services::{FamilyOnboarding, HttpFamilyService, HttpIdentityService};
use session_core::{SessionBootstrapController, TokenKey, TokenStore};
use std::sync::Arc;
use tower_sessions::Session;

pub const USER_KEY: &str = "user";
pub const FLASH_KEY: &str = "flash";
pub const OAUTH_STATE_KEY: &str = "oauth_state";

/// [`TokenStore`] backed by the request's cookie session.
#[derive(Clone)]
pub struct SessionTokenStore {
    session: Session,
}

impl SessionTokenStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TokenStore for SessionTokenStore {
    async fn get(&self, key: TokenKey) -> Result<Option<String>, anyhow::Error> {
        Ok(self.session.get::<String>(key.as_str()).await?)
    }

    async fn set(&self, key: TokenKey, value: &str) -> Result<(), anyhow::Error> {
        self.session.insert(key.as_str(), value).await?;
        Ok(())
    }

    async fn clear(&self, key: TokenKey) -> Result<(), anyhow::Error> {
        self.session.remove::<String>(key.as_str()).await?;
        Ok(())
    }
}

pub struct SessionServices {
    session: Session,
    pub tokens: Arc<SessionTokenStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
    pub client: RefreshingClient,
}

impl SessionServices {
    pub fn new(api: &ApiClient, gate: Arc<RefreshGate>, session: Session) -> Self {
        let tokens = Arc::new(SessionTokenStore::new(session.clone()));
        let navigator = Arc::new(RecordingNavigator::new());
        let client = RefreshingClient::new(api.clone(), tokens.clone()).with_gate(gate);

        Self {
            session,
            tokens,
            navigator,
            notifier: Arc::new(RecordingNotifier::new()),
            client,
        }
    }

    pub fn bootstrap(&self) -> SessionBootstrapController {
        SessionBootstrapController::new(
            self.tokens.clone(),
            Arc::new(HttpIdentityService::new(self.client.clone())),
            Arc::new(HttpFamilyService::new(self.client.clone())),
            self.navigator.clone(),
            self.notifier.clone(),
        )
    }

    pub fn onboarding(&self) -> FamilyOnboarding {
        FamilyOnboarding::new(self.client.clone(), self.navigator.clone())
    }

    /// Redirect to the last route the services asked for, or `fallback` if none.
    pub fn redirect_or(&self, fallback: RouteTarget) -> Redirect {
        let target = self.navigator.last().unwrap_or(fallback);
        Redirect::to(&target.path())
    }

    /// True once a flow has given up on the session and sent the user to login.
    pub fn session_expired(&self) -> bool {
        matches!(self.navigator.last(), Some(RouteTarget::LoginPage(_)))
    }

    /// Carry any toasts raised during this request over to the next page.
    pub async fn persist_flash(&self) {
        let messages: Vec<String> = self
            .notifier
            .toasts()
            .into_iter()
            .map(|toast| toast.message)
            .collect();
        if messages.is_empty() {
            return;
        }
        if let Err(e) = self.session.insert(FLASH_KEY, messages).await {
            tracing::warn!(error = %e, "Failed to store flash messages");
        }
    }

    pub async fn remember_user(&self, user: Option<&UserIdentity>) {
        let result = match user {
            Some(user) => self.session.insert(USER_KEY, user).await,
            None => self
                .session
                .remove::<UserIdentity>(USER_KEY)
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to update cached identity");
        }
    }
}

pub async fn cached_user(session: &Session) -> Option<UserIdentity> {
    session.get::<UserIdentity>(USER_KEY).await.unwrap_or(None)
}

pub async fn take_flash(session: &Session) -> Vec<String> {
    session
        .remove::<Vec<String>>(FLASH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}
