//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use meshbus_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration file
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                if config.router.inbound_queue_size == 0 {
                    let e = AppError::configuration("router.inbound_queue_size must be positive");
                    output::print_error(&format!("Configuration invalid: {}", e));
                    return Err(e);
                }
                output::print_success(&format!("Configuration '{}' is valid", config_path));
                output::print_kv("Role", &config.router.role.to_string());
                output::print_kv(
                    "Inbound queue",
                    &config.router.inbound_queue_size.to_string(),
                );
                output::print_kv(
                    "Join timeout",
                    &format!("{} ms", config.session.join_timeout_ms),
                );
                output::print_kv(
                    "Link timeout",
                    &match config.router.link_timeout_seconds {
                        0 => "disabled".to_string(),
                        s => format!("{s} s"),
                    },
                );
                output::print_kv(
                    "IP by default",
                    &config.permission.ip_allowed_by_default.to_string(),
                );
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
