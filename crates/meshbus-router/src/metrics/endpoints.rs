//! Endpoint metrics helpers.

use std::sync::atomic::Ordering;

use super::BusMetrics;

/// Record a registered endpoint
pub fn record_register(metrics: &BusMetrics) {
    metrics.endpoints_total.fetch_add(1, Ordering::Relaxed);
    metrics.endpoints_active.fetch_add(1, Ordering::Relaxed);
}

/// Record an unregistered endpoint
pub fn record_unregister(metrics: &BusMetrics) {
    metrics.endpoints_active.fetch_sub(1, Ordering::Relaxed);
}
