//! Transport permission configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Seed data for the transport permission database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Whether users without an explicit entry may use IP transports.
    #[serde(default = "default_true")]
    pub ip_allowed_by_default: bool,
    /// User ids that may not use IP transports.
    #[serde(default)]
    pub ip_denied_users: Vec<u32>,
    /// User ids that may not use any transport.
    #[serde(default)]
    pub all_denied_users: Vec<u32>,
    /// Unix user aliases: user id (as string key) to the id whose
    /// permissions it assumes.
    #[serde(default)]
    pub user_aliases: HashMap<String, u32>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            ip_allowed_by_default: true,
            ip_denied_users: Vec::new(),
            all_denied_users: Vec::new(),
            user_aliases: HashMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
