//! Endpoint registry and router configuration.

use serde::{Deserialize, Serialize};

/// Whether this bus instance may mint unique names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterRole {
    /// A routing node that owns the unique-name authority.
    #[default]
    Daemon,
    /// A pure client router; unique names are assigned by the remote daemon.
    Client,
}

impl std::fmt::Display for RouterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterRole::Daemon => write!(f, "daemon"),
            RouterRole::Client => write!(f, "client"),
        }
    }
}

/// Router and endpoint registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Name-minting role of this instance.
    #[serde(default)]
    pub role: RouterRole,
    /// Fixed short guid used as the unique-name prefix. Random when unset.
    #[serde(default)]
    pub guid: Option<String>,
    /// Capacity of each endpoint's inbound message queue.
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue_size: usize,
    /// Idle time in seconds after which a remote endpoint is considered lost.
    /// `0` disables link supervision.
    #[serde(default)]
    pub link_timeout_seconds: u64,
    /// How often the link monitor sweeps remote endpoints, in seconds.
    #[serde(default = "default_link_check_interval")]
    pub link_check_interval_seconds: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            role: RouterRole::default(),
            guid: None,
            inbound_queue_size: default_inbound_queue(),
            link_timeout_seconds: 0,
            link_check_interval_seconds: default_link_check_interval(),
        }
    }
}

fn default_inbound_queue() -> usize {
    256
}

fn default_link_check_interval() -> u64 {
    5
}
