//! Link supervision for remote endpoints.
//!
//! A remote peer that has shown no activity for longer than the configured
//! link timeout is unregistered; its session peers see reason
//! [`SessionLostReason::LinkTimeout`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, warn};

use meshbus_core::events::SessionLostReason;

use super::registry::EndpointRegistry;

/// Link monitor configuration
#[derive(Debug, Clone)]
pub struct LinkMonitorConfig {
    /// How often remote endpoints are swept
    pub check_interval: Duration,
    /// Idle time after which a remote link is considered dead
    pub link_timeout: Duration,
}

/// Unregisters remote endpoints idle past `link_timeout` as of `now`.
///
/// Returns the names that were dropped.
pub fn sweep(registry: &EndpointRegistry, link_timeout: Duration, now: DateTime<Utc>) -> Vec<String> {
    let mut expired = Vec::new();
    for endpoint in registry.remote_endpoints() {
        let idle = (now - endpoint.last_activity()).to_std().unwrap_or_default();
        if idle > link_timeout {
            warn!(
                endpoint = %endpoint.name,
                idle_ms = idle.as_millis() as u64,
                "Remote link timed out"
            );
            registry.unregister_with_reason(&endpoint.name, SessionLostReason::LinkTimeout);
            expired.push(endpoint.name.clone());
        }
    }
    expired
}

/// Runs the link monitor until shutdown.
pub async fn run_link_monitor(
    registry: Arc<EndpointRegistry>,
    config: LinkMonitorConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = time::interval(config.check_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = interval.tick() => {
                sweep(&registry, config.link_timeout, Utc::now());
            }
        }
    }

    debug!("Link monitor ended");
}
