//! End-to-end workflow tests for the session layer.
//!
//! Each test spawns its own `mock-api` on an ephemeral port and drives the
//! session-core services against it over real HTTP, so refresh, identity and
//! family calls go through the same client stack the front end uses.
//!
//! ## Usage
//!
//! ```bash
//! cargo test -p workflow-tests
//! ```

use anyhow::{Result, anyhow};
use mock_api::MockState;
use session_core::config::ApiSettings;
use session_core::http::{ApiClient, RefreshingClient};
use session_core::navigation::{RecordingNavigator, RecordingNotifier};
use session_core::services::{AuthApi, FamilyOnboarding, HttpFamilyService, HttpIdentityService};
use session_core::{MemoryTokenStore, SessionBootstrapController, TokenStore};
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug,session_core=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A mock backend serving on 127.0.0.1 for the lifetime of the test runtime.
pub struct TestBackend {
    /// Shared with the server; use it to expire tokens or remove users mid-test.
    pub state: MockState,
    pub base_url: String,
    pub health_url: String,
}

impl TestBackend {
    pub async fn spawn(state: MockState) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = mock_api::build_router(state.clone());

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });

        let backend = Self {
            state,
            base_url: format!("http://{}/api/v1", addr),
            health_url: format!("http://{}/health", addr),
        };
        wait_for_backend(&backend.health_url, Duration::from_secs(5)).await?;
        Ok(backend)
    }
}

/// One simulated client: its own token store, navigation sinks and services.
pub struct WorkflowTestContext {
    pub api: ApiClient,
    pub tokens: Arc<MemoryTokenStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
    pub client: RefreshingClient,
}

impl WorkflowTestContext {
    pub fn new(backend: &TestBackend) -> Result<Self> {
        init_tracing();

        let api = ApiClient::new(ApiSettings::with_base_url(&backend.base_url))
            .map_err(|e| anyhow!("Failed to build API client: {}", e))?;
        let tokens = Arc::new(MemoryTokenStore::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let client = RefreshingClient::new(api.clone(), tokens.clone());

        Ok(Self {
            api,
            tokens,
            navigator,
            notifier: Arc::new(RecordingNotifier::new()),
            client,
        })
    }

    /// Complete an OAuth login with `code` and keep the issued tokens.
    pub async fn login(&self, code: &str) -> Result<()> {
        let pair = AuthApi::new(self.api.clone())
            .exchange_code(code, None)
            .await
            .map_err(|e| anyhow!("OAuth exchange failed: {}", e))?;
        self.tokens.store_pair(&pair).await
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
}

/// Poll `health_url` until it answers 200 OK or `timeout` passes.
pub async fn wait_for_backend(health_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    loop {
        match client
            .get(health_url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => tracing::debug!(status = %resp.status(), "Backend not ready"),
            Err(e) => tracing::debug!(error = %e, "Backend not reachable yet"),
        }

        if start.elapsed() > timeout {
            return Err(anyhow!("Timeout waiting for mock backend at {}", health_url));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
