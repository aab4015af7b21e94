use service_core::observability::init_tracing;
use vault_service::config::VaultConfig;
use vault_service::services::metrics::init_metrics;
use vault_service::startup::Application;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = VaultConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "vault-service",
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    );

    init_metrics().map_err(|e| {
        tracing::error!("Failed to initialize metrics: {}", e);
        std::io::Error::other(format!("Metrics error: {}", e))
    })?;

    tracing::info!(
        environment = ?config.common.environment,
        storage_backend = ?config.storage.backend,
        "Starting vault-service"
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await
}
