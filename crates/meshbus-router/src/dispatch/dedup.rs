//! Suppression of duplicate deliveries within one committed event.

use std::collections::HashSet;
use std::sync::Arc;

use meshbus_core::events::SessionEvent;

use super::listener::SessionListener;

/// Listener identity paired with the delivered event.
type DedupKey = (usize, SessionEvent);

/// Tracks which listener has already seen which event of a batch.
///
/// A listener object registered for several endpoints would otherwise be
/// called once per endpoint for the same event.
#[derive(Debug, Default)]
pub struct EventDeduplicator {
    seen: HashSet<DedupKey>,
}

impl EventDeduplicator {
    /// Create an empty deduplicator for one batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the event should be delivered to this listener.
    ///
    /// Returns `true` the first time a (listener, event) pair is offered.
    pub fn should_dispatch(&mut self, listener: &Arc<dyn SessionListener>, event: &SessionEvent) -> bool {
        let identity = Arc::as_ptr(listener) as *const () as usize;
        self.seen.insert((identity, event.clone()))
    }
}
