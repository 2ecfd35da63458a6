//! CLI command definitions and dispatch.

pub mod config;
pub mod permission;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use meshbus_core::config::AppConfig;
use meshbus_core::error::AppError;

/// MeshBus: peer-to-peer message bus router
#[derive(Debug, Parser)]
#[command(name = "meshbus", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a bus instance in the foreground
    Serve(serve::ServeArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Transport permission checks
    Permission(permission::PermissionArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Serve(args) => serve::execute(args, &self.config, self.format).await,
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
            Commands::Permission(args) => {
                permission::execute(args, &self.config, self.format).await
            }
        }
    }
}

/// Helper: load configuration from file, falling back to defaults when the
/// file does not exist
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    if std::path::Path::new(config_path).exists() {
        AppConfig::load_from(config_path)
    } else {
        tracing::warn!("Config file '{}' not found, using defaults", config_path);
        Ok(AppConfig::default())
    }
}
