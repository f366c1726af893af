use dearfam_frontend::AppState;
use dearfam_frontend::config::get_configuration;
use dearfam_frontend::startup::{build_router, session_key};
use dotenvy::dotenv;
use session_core::http::ApiClient;
use session_core::observability::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "dearfam-frontend",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    dearfam_frontend::services::metrics::init_metrics()?;

    let api = ApiClient::new(configuration.api.clone())?;
    let key = session_key(&configuration.server)?;
    let app = build_router(AppState::new(api, configuration.oauth.clone()), key);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!(backend = %configuration.api.base_url, "Starting dearfam-frontend on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
