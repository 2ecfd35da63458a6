//! Session and notification metrics helpers.

use std::sync::atomic::Ordering;

use super::BusMetrics;

/// Record a new session
pub fn record_created(metrics: &BusMetrics) {
    metrics.sessions_created.fetch_add(1, Ordering::Relaxed);
}

/// Record a torn-down session
pub fn record_torn_down(metrics: &BusMetrics) {
    metrics.sessions_torn_down.fetch_add(1, Ordering::Relaxed);
}

/// Record a delivered listener callback
pub fn record_delivered(metrics: &BusMetrics) {
    metrics
        .notifications_delivered
        .fetch_add(1, Ordering::Relaxed);
}

/// Record a suppressed duplicate notification
pub fn record_deduped(metrics: &BusMetrics) {
    metrics
        .notifications_deduplicated
        .fetch_add(1, Ordering::Relaxed);
}
