use dlq_manager::{
    api::{build_router, AppState},
    broker::{create_broker, init_dlq_metrics},
    config::Config,
    dlq::DeadLetterManager,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_tracing(&config);

    if let Some(e) = load_error {
        tracing::warn!("Failed to load configuration: {}", e);
        tracing::warn!("Using default configuration");
    }
    config.validate()?;

    tracing::info!(
        "Starting {} v{}",
        config.observability.service_name,
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.prometheus_enabled {
        init_dlq_metrics();
        tracing::info!("Prometheus metrics initialized");
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    let broker = create_broker(&config.broker)?;
    tracing::info!(
        backend = broker.backend_name(),
        queue = %config.broker.queue_name,
        "Broker client initialized"
    );

    let manager = Arc::new(DeadLetterManager::new(
        broker,
        config.broker.queue_name.clone(),
        config.dlq.clone(),
    ));

    let app = build_router(
        AppState::new(manager),
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Dead-letter API: http://{}/v1/dlq/messages", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "dlq_manager={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
