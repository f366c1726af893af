use mock_api::{MockState, build_router, config::MockConfig};
use session_core::observability::init_tracing;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MockConfig::load()?;

    init_tracing("mock-api", &config.log_level, None);

    let state = if config.seed_demo_data {
        MockState::with_demo_data()
    } else {
        MockState::new()
    };

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        address = %addr,
        seeded = config.seed_demo_data,
        "Mock backend listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Mock backend shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Received SIGINT, shutting down");
}
