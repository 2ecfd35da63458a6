//! Application-supplied listener interfaces.
//!
//! Every callback has a no-op default, so an application implements only
//! the notifications it cares about.

use async_trait::async_trait;

use meshbus_core::events::SessionLostReason;
use meshbus_core::types::{SessionId, SessionOpts, SessionPort};

/// Receives membership and lifecycle notifications for joined sessions.
///
/// Callbacks run on the dispatch task, never while the session table is
/// locked. They must not block.
pub trait SessionListener: Send + Sync {
    /// The session is over for this endpoint.
    fn session_lost(&self, _session_id: SessionId, _reason: SessionLostReason) {}

    /// Another endpoint joined the session.
    fn session_member_added(&self, _session_id: SessionId, _unique_name: &str) {}

    /// Another endpoint left or was removed from the session.
    fn session_member_removed(&self, _session_id: SessionId, _unique_name: &str) {}
}

/// Binder-side listener attached to a bound session port.
#[async_trait]
pub trait SessionPortListener: Send + Sync {
    /// Decide whether `joiner` may join. Refuses unless overridden.
    async fn accept_session_joiner(
        &self,
        _port: SessionPort,
        _joiner: &str,
        _opts: &SessionOpts,
    ) -> bool {
        false
    }

    /// A joiner was admitted; runs on the dispatch task after commit.
    fn session_joined(&self, _port: SessionPort, _session_id: SessionId, _joiner: &str) {}
}
