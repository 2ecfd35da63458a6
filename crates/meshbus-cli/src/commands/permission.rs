//! Transport permission CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use meshbus_core::error::AppError;
use meshbus_core::types::{TransportMask, UserId};
use meshbus_router::BusController;

use crate::output::{self, OutputFormat};

/// Arguments for permission commands
#[derive(Debug, Args)]
pub struct PermissionArgs {
    /// Permission subcommand
    #[command(subcommand)]
    pub command: PermissionCommand,
}

/// Permission subcommands
#[derive(Debug, Subcommand)]
pub enum PermissionCommand {
    /// Run the transport filter for a user against a requested mask
    Check {
        /// User id of the hypothetical endpoint
        #[arg(long)]
        uid: u32,
        /// Requested transports, e.g. `ip,local` or `0x0105`
        #[arg(long, default_value = "any")]
        transports: String,
    },
    /// List the configured users and what they may use
    List,
}

/// Permission display row
#[derive(Debug, Serialize, Tabled)]
struct PermissionRow {
    /// User ID
    uid: u32,
    /// Effective user after aliasing
    effective: String,
    /// Allowed mask
    allowed: String,
    /// IP allowed
    ip: String,
}

/// Filter result row
#[derive(Debug, Serialize, Tabled)]
struct CheckRow {
    /// User ID
    uid: u32,
    /// Requested mask
    requested: String,
    /// Granted mask
    granted: String,
}

/// Execute permission commands
pub async fn execute(
    args: &PermissionArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;

    match &args.command {
        PermissionCommand::Check { uid, transports } => {
            let requested: TransportMask = transports
                .parse()
                .map_err(AppError::invalid_argument)?;

            let bus = BusController::new(config);
            let attachment = bus.connect_local(UserId(*uid))?;
            let result = bus.permissions.filter_transports(
                &attachment.endpoint,
                requested,
                "cli",
            );
            bus.shutdown().await?;

            match result {
                Ok(granted) => {
                    if granted != requested {
                        output::print_warning("Some requested transports were removed");
                    }
                    output::print_list(
                        &[CheckRow {
                            uid: *uid,
                            requested: requested.to_string(),
                            granted: granted.to_string(),
                        }],
                        format,
                    );
                }
                Err(e) => {
                    output::print_error(&format!("Filter refused: {}", e));
                    return Err(e);
                }
            }
        }
        PermissionCommand::List => {
            let db = meshbus_router::PermissionDb::from_config(&config.permission);
            let mut uids: Vec<u32> = config
                .permission
                .ip_denied_users
                .iter()
                .chain(config.permission.all_denied_users.iter())
                .copied()
                .chain(
                    config
                        .permission
                        .user_aliases
                        .keys()
                        .filter_map(|k| k.parse::<u32>().ok()),
                )
                .collect();
            uids.sort_unstable();
            uids.dedup();

            let rows: Vec<PermissionRow> = uids
                .into_iter()
                .map(|uid| {
                    let allowed = db.allowed_transports(UserId(uid));
                    PermissionRow {
                        uid,
                        effective: config
                            .permission
                            .user_aliases
                            .get(&uid.to_string())
                            .map(|a| a.to_string())
                            .unwrap_or_else(|| uid.to_string()),
                        allowed: allowed.to_string(),
                        ip: if db.is_ip_allowed(UserId(uid)) { "✓" } else { "✗" }.to_string(),
                    }
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    Ok(())
}
