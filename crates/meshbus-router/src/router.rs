//! Message router.
//!
//! Routing is at-most-once and never retried here: a message that fails a
//! check is dropped and the failure is returned to the sender, and a
//! saturated destination queue surfaces as a retryable `Busy`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use meshbus_core::error::{AppError, ErrorKind};

use crate::endpoint::{BusEndpoint, EndpointKind, EndpointRegistry};
use crate::message::types::Message;
use crate::message::validator::validate_message;
use crate::metrics::{BusMetrics, messages};
use crate::permission::TransportPermission;
use crate::session::SessionTable;

/// Routes messages between registered endpoints.
#[derive(Debug)]
pub struct Router {
    registry: Arc<EndpointRegistry>,
    sessions: Arc<SessionTable>,
    permission: TransportPermission,
    metrics: Arc<BusMetrics>,
}

impl Router {
    /// Creates a router over the given registry and session table.
    pub fn new(
        registry: Arc<EndpointRegistry>,
        sessions: Arc<SessionTable>,
        permission: TransportPermission,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        Self {
            registry,
            sessions,
            permission,
            metrics,
        }
    }

    /// Routes `msg` from `sender`. Returns the number of queues it reached.
    ///
    /// A unicast message reports every failure. Session-casts and broadcasts
    /// skip destinations that cannot take the message.
    pub fn push_message(&self, msg: Message, sender: &str) -> Result<usize, AppError> {
        let result = self.route(msg, sender);
        if let Err(e) = &result {
            match e.kind {
                ErrorKind::Busy => messages::record_busy(&self.metrics),
                _ => messages::record_dropped(&self.metrics),
            }
            debug!(sender = %sender, error = %e, "Message not routed");
        }
        result
    }

    fn route(&self, mut msg: Message, sender: &str) -> Result<usize, AppError> {
        validate_message(&msg)?;

        let origin = self.registry.find(sender)?;
        if !origin.is_valid() {
            return Err(AppError::no_endpoint(format!("Sender {sender} is disconnected")));
        }
        origin.touch();
        msg.sender = sender.to_string();
        msg.timestamp = Utc::now();

        if let Some(id) = msg.session_id {
            self.sessions.check_member(id, sender)?;
        }

        if !msg.is_broadcast() {
            let dest = self.registry.find(&msg.destination)?;
            if let Some(id) = msg.session_id {
                if self.sessions.check_member(id, &dest.name).is_err() {
                    return Err(AppError::not_session_member(format!(
                        "{} is not a member of session {id}",
                        dest.name
                    )));
                }
            }
            self.forward(&origin, &dest, msg)?;
            return Ok(1);
        }

        let targets: Vec<Arc<BusEndpoint>> = match msg.session_id {
            Some(id) => self
                .sessions
                .members(id)?
                .iter()
                .filter(|m| m.as_str() != sender)
                .filter_map(|m| self.registry.get(m))
                .collect(),
            None => self
                .registry
                .others(sender)
                .into_iter()
                .filter(|e| e.is_valid())
                .collect(),
        };

        let mut delivered = 0;
        for dest in &targets {
            match self.forward(&origin, dest, msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    if e.kind == ErrorKind::Busy {
                        messages::record_busy(&self.metrics);
                    } else {
                        messages::record_dropped(&self.metrics);
                    }
                    trace!(destination = %dest.name, error = %e, "Fan-out destination skipped");
                }
            }
        }
        debug!(
            sender = %sender,
            session_id = ?msg.session_id,
            targets = targets.len(),
            delivered,
            "Fan-out routed"
        );
        Ok(delivered)
    }

    /// Places `msg` on `dest`'s queue, filtering transports across a
    /// transport boundary first.
    fn forward(&self, origin: &BusEndpoint, dest: &BusEndpoint, msg: Message) -> Result<(), AppError> {
        if dest.kind == EndpointKind::Remote {
            self.permission
                .filter_transports(origin, dest.transport, "push_message")?;
        }
        dest.deliver(msg)?;
        messages::record_routed(&self.metrics);
        trace!(sender = %origin.name, destination = %dest.name, "Message routed");
        Ok(())
    }
}
