//! Session port reservations.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use meshbus_core::types::{SessionId, SessionOpts, SessionPort};

use crate::dispatch::SessionPortListener;

/// A port reserved by a binder.
#[derive(Clone)]
pub struct BoundPort {
    /// Endpoint that owns the reservation.
    pub binder: String,
    /// The port.
    pub port: SessionPort,
    /// Host-side options offered to joiners.
    pub opts: SessionOpts,
    /// Accept-callback and join notifications.
    pub listener: Arc<dyn SessionPortListener>,
    /// The multipoint session joiners attach to, once created.
    pub active_session: Option<SessionId>,
    /// When the port was bound.
    pub bound_at: DateTime<Utc>,
}

impl BoundPort {
    /// Creates a reservation.
    pub fn new(
        binder: String,
        port: SessionPort,
        opts: SessionOpts,
        listener: Arc<dyn SessionPortListener>,
    ) -> Self {
        Self {
            binder,
            port,
            opts,
            listener,
            active_session: None,
            bound_at: Utc::now(),
        }
    }
}

impl fmt::Debug for BoundPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundPort")
            .field("binder", &self.binder)
            .field("port", &self.port)
            .field("opts", &self.opts)
            .field("active_session", &self.active_session)
            .finish()
    }
}
