pub mod config;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod session;
pub mod startup;

use session_core::http::{ApiClient, RefreshGate};
use std::sync::Arc;
use tower_sessions::Session;

use crate::config::OAuthSettings;
use crate::session::SessionServices;

/// Shared application state: one backend client and one refresh gate for every request.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub oauth: Arc<OAuthSettings>,
    pub refresh_gate: Arc<RefreshGate>,
}

impl AppState {
    pub fn new(api: ApiClient, oauth: OAuthSettings) -> Self {
        Self {
            api,
            oauth: Arc::new(oauth),
            refresh_gate: Arc::new(RefreshGate::new()),
        }
    }

    pub fn session_services(&self, session: Session) -> SessionServices {
        SessionServices::new(&self.api, self.refresh_gate.clone(), session)
    }
}
