//! Bus metrics.

pub mod endpoints;
pub mod messages;
pub mod sessions;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Bus-level metrics counters.
#[derive(Debug)]
pub struct BusMetrics {
    /// Messages delivered to a destination queue
    pub messages_routed: AtomicU64,
    /// Messages rejected by routing checks
    pub messages_dropped: AtomicU64,
    /// Messages rejected because the destination was saturated
    pub messages_busy: AtomicU64,
    /// Endpoints ever registered
    pub endpoints_total: AtomicU64,
    /// Endpoints currently registered
    pub endpoints_active: AtomicU64,
    /// Sessions created
    pub sessions_created: AtomicU64,
    /// Sessions torn down
    pub sessions_torn_down: AtomicU64,
    /// Listener callbacks invoked
    pub notifications_delivered: AtomicU64,
    /// Duplicate notifications suppressed
    pub notifications_deduplicated: AtomicU64,
}

impl BusMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self {
            messages_routed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            messages_busy: AtomicU64::new(0),
            endpoints_total: AtomicU64::new(0),
            endpoints_active: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
            sessions_torn_down: AtomicU64::new(0),
            notifications_delivered: AtomicU64::new(0),
            notifications_deduplicated: AtomicU64::new(0),
        }
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_busy: self.messages_busy.load(Ordering::Relaxed),
            endpoints_total: self.endpoints_total.load(Ordering::Relaxed),
            endpoints_active: self.endpoints_active.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_torn_down: self.sessions_torn_down.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            notifications_deduplicated: self.notifications_deduplicated.load(Ordering::Relaxed),
        }
    }
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Messages delivered to a destination queue
    pub messages_routed: u64,
    /// Messages rejected by routing checks
    pub messages_dropped: u64,
    /// Messages rejected with busy
    pub messages_busy: u64,
    /// Endpoints ever registered
    pub endpoints_total: u64,
    /// Endpoints currently registered
    pub endpoints_active: u64,
    /// Sessions created
    pub sessions_created: u64,
    /// Sessions torn down
    pub sessions_torn_down: u64,
    /// Listener callbacks invoked
    pub notifications_delivered: u64,
    /// Duplicate notifications suppressed
    pub notifications_deduplicated: u64,
}
