//! Session table configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Default deadline for the binder's accept-callback, in milliseconds.
    #[serde(default = "default_join_timeout")]
    pub join_timeout_ms: u64,
    /// Maximum members of a multipoint session. `0` means unlimited.
    #[serde(default)]
    pub max_members: usize,
}

impl SessionConfig {
    /// The accept-callback deadline as a [`Duration`].
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: default_join_timeout(),
            max_members: 0,
        }
    }
}

fn default_join_timeout() -> u64 {
    10_000
}
