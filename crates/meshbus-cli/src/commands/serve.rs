//! Run a bus instance in the foreground.

use clap::Args;

use meshbus_core::config::RouterRole;
use meshbus_core::error::AppError;
use meshbus_router::BusController;

use crate::output::{self, OutputFormat};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the fixed unique-name guid
    #[arg(long)]
    pub guid: Option<String>,

    /// Run as a client router that cannot mint unique names
    #[arg(long)]
    pub client: bool,

    /// Override the link timeout in seconds (0 disables it)
    #[arg(long)]
    pub link_timeout: Option<u64>,
}

/// Execute the serve command
pub async fn execute(
    args: &ServeArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let mut config = super::load_config(config_path)?;

    if let Some(ref guid) = args.guid {
        config.router.guid = Some(guid.clone());
    }
    if args.client {
        config.router.role = RouterRole::Client;
    }
    if let Some(timeout) = args.link_timeout {
        config.router.link_timeout_seconds = timeout;
    }

    println!("Starting MeshBus...");
    output::print_kv("Role", &config.router.role.to_string());
    output::print_kv(
        "Inbound queue",
        &config.router.inbound_queue_size.to_string(),
    );

    let bus = BusController::new(config);
    output::print_kv("Guid", bus.registry.guid());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for Ctrl+C: {}", e)))?;

    output::print_item(&bus.snapshot(), format);
    bus.shutdown().await?;
    output::print_success("Bus stopped");
    Ok(())
}
