//! Message metrics helpers.

use std::sync::atomic::Ordering;

use super::BusMetrics;

/// Record a message placed on a destination queue
pub fn record_routed(metrics: &BusMetrics) {
    metrics.messages_routed.fetch_add(1, Ordering::Relaxed);
}

/// Record a message rejected by routing checks
pub fn record_dropped(metrics: &BusMetrics) {
    metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
}

/// Record a message rejected by backpressure
pub fn record_busy(metrics: &BusMetrics) {
    metrics.messages_busy.fetch_add(1, Ordering::Relaxed);
}
