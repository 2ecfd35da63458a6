//! Listener registrations, owned by the dispatch task.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use meshbus_core::types::SessionId;

use super::listener::SessionListener;

/// Endpoint → session listener bookkeeping.
///
/// A per-session listener strictly replaces the endpoint's global listener
/// for that one session id.
#[derive(Default)]
pub struct ListenerRegistry {
    /// Endpoint name → attachment-wide listener.
    global: HashMap<String, Arc<dyn SessionListener>>,
    /// (endpoint name, session id) → per-session override.
    per_session: HashMap<(String, SessionId), Arc<dyn SessionListener>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("global", &self.global.len())
            .field("per_session", &self.per_session.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears a listener. `session` selects the per-session slot.
    pub fn set(
        &mut self,
        endpoint: &str,
        session: Option<SessionId>,
        listener: Option<Arc<dyn SessionListener>>,
    ) {
        match (session, listener) {
            (None, Some(l)) => {
                self.global.insert(endpoint.to_string(), l);
            }
            (None, None) => {
                self.global.remove(endpoint);
            }
            (Some(id), Some(l)) => {
                self.per_session.insert((endpoint.to_string(), id), l);
            }
            (Some(id), None) => {
                self.per_session.remove(&(endpoint.to_string(), id));
            }
        }
    }

    /// The listener that receives `endpoint`'s notifications for `session_id`.
    pub fn resolve(&self, endpoint: &str, session_id: SessionId) -> Option<Arc<dyn SessionListener>> {
        self.per_session
            .get(&(endpoint.to_string(), session_id))
            .or_else(|| self.global.get(endpoint))
            .cloned()
    }

    /// The per-session listener alone, without the global fallback.
    pub fn resolve_scoped(
        &self,
        endpoint: &str,
        session_id: SessionId,
    ) -> Option<Arc<dyn SessionListener>> {
        self.per_session
            .get(&(endpoint.to_string(), session_id))
            .cloned()
    }

    /// Drops the per-session override after the endpoint leaves a session.
    pub fn forget_session(&mut self, endpoint: &str, session_id: SessionId) {
        self.per_session.remove(&(endpoint.to_string(), session_id));
    }

    /// Drops every registration of a disconnected endpoint.
    pub fn forget_endpoint(&mut self, endpoint: &str) {
        self.global.remove(endpoint);
        self.per_session.retain(|(name, _), _| name != endpoint);
    }

    /// Number of registrations held.
    pub fn len(&self) -> usize {
        self.global.len() + self.per_session.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
