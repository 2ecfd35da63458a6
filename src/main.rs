//! MeshBus daemon
//!
//! Main entry point that builds the bus controller from configuration and
//! runs it until a shutdown signal arrives.

use tracing_subscriber::{EnvFilter, fmt};

use meshbus_core::config::AppConfig;
use meshbus_core::error::AppError;
use meshbus_router::BusController;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Daemon error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("MESHBUS_CONFIG") {
        Ok(path) => AppConfig::load_from(&path),
        Err(_) => {
            let env = std::env::var("MESHBUS_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main daemon run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MeshBus v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        role = %config.router.role,
        inbound_queue_size = config.router.inbound_queue_size,
        join_timeout_ms = config.session.join_timeout_ms,
        link_timeout_seconds = config.router.link_timeout_seconds,
        "Configuration loaded"
    );

    let bus = BusController::new(config);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    let snapshot = bus.snapshot();
    tracing::info!(
        endpoints = snapshot.endpoints,
        sessions = snapshot.sessions,
        messages_routed = snapshot.metrics.messages_routed,
        "Final bus state"
    );

    bus.shutdown().await
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
