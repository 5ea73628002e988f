use anyhow::Result;
use session_api::{create_app, telemetry, Config};
use session_orchestrator::SessionManager;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init()?;

    info!("Starting session-api service...");

    let config = Config::from_env();
    info!(
        "Configuration loaded: bind_addr={}, storage_root={}",
        config.bind_addr,
        config.settings.workspace_storage_root.display()
    );

    let manager = SessionManager::from_settings(config.settings)?;
    let app = create_app(manager);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping server..."),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
