//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a default so a missing file still yields
//! a runnable bus.

pub mod logging;
pub mod permission;
pub mod router;
pub mod session;

use serde::{Deserialize, Serialize};

use self::logging::LoggingConfig;
use self::permission::PermissionConfig;
use self::router::RouterConfig;
use self::session::SessionConfig;

use crate::error::AppError;

pub use self::router::RouterRole;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Endpoint registry and router settings.
    #[serde(default)]
    pub router: RouterConfig,
    /// Session table settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Transport permission settings.
    #[serde(default)]
    pub permission: PermissionConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `MESHBUS__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MESHBUS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Load configuration from a single explicit file.
    pub fn load_from(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
