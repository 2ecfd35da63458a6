//! Individual bus endpoint handle.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use meshbus_core::error::AppError;
use meshbus_core::types::{TransportMask, UserId};

use crate::message::types::Message;

/// Where an endpoint lives relative to this router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// An application attached to this router.
    Local,
    /// A peer reached through a transport.
    Remote,
    /// Placeholder for an unresolved endpoint; never valid.
    Null,
}

/// A handle to a single bus endpoint.
///
/// Holds the sender side of the endpoint's bounded inbound queue plus
/// metadata used by routing and permission checks.
#[derive(Debug)]
pub struct BusEndpoint {
    /// Unique bus name
    pub name: String,
    /// Local, remote or null
    pub kind: EndpointKind,
    /// Authenticated user id
    pub user_id: UserId,
    /// Transport this endpoint is reached through
    pub transport: TransportMask,
    /// Sender for inbound messages
    sender: mpsc::Sender<Message>,
    /// When the endpoint was registered
    pub connected_at: DateTime<Utc>,
    /// Last time a message was seen from this endpoint
    last_activity: Mutex<DateTime<Utc>>,
    /// Whether the endpoint is still connected
    alive: AtomicBool,
}

impl BusEndpoint {
    /// Create a new endpoint handle
    pub fn new(
        name: String,
        kind: EndpointKind,
        user_id: UserId,
        transport: TransportMask,
        sender: mpsc::Sender<Message>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name,
            kind,
            user_id,
            transport,
            sender,
            connected_at: now,
            last_activity: Mutex::new(now),
            alive: AtomicBool::new(true),
        }
    }

    /// Create a null endpoint standing in for an unresolved name.
    pub fn null(name: impl Into<String>) -> Self {
        let (tx, _) = mpsc::channel(1);
        let endpoint = Self::new(
            name.into(),
            EndpointKind::Null,
            UserId::INVALID,
            TransportMask::NONE,
            tx,
        );
        endpoint.mark_dead();
        endpoint
    }

    /// Push a message onto this endpoint's inbound queue without waiting.
    ///
    /// A full queue is reported as [`Busy`](meshbus_core::ErrorKind::Busy);
    /// a closed queue marks the endpoint dead.
    pub fn deliver(&self, msg: Message) -> Result<(), AppError> {
        if !self.is_alive() {
            return Err(AppError::no_endpoint(format!(
                "Endpoint {} is disconnected",
                self.name
            )));
        }
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(endpoint = %self.name, "Inbound queue full, rejecting message");
                Err(AppError::busy(format!(
                    "Inbound queue of {} is full",
                    self.name
                )))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                Err(AppError::no_endpoint(format!(
                    "Endpoint {} closed its queue",
                    self.name
                )))
            }
        }
    }

    /// Check if the endpoint is still connected
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether the endpoint can take part in routing
    pub fn is_valid(&self) -> bool {
        self.kind != EndpointKind::Null && self.is_alive()
    }

    /// Mark the endpoint as disconnected
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Update last activity timestamp. Called for traffic the endpoint
    /// originates, never for traffic addressed to it.
    pub fn touch(&self) {
        let mut la = self.last_activity.lock().unwrap_or_else(|e| e.into_inner());
        *la = Utc::now();
    }

    /// Time of the last recorded activity
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get a snapshot of endpoint info
    pub fn info(&self) -> EndpointInfo {
        EndpointInfo {
            name: self.name.clone(),
            kind: self.kind,
            user_id: self.user_id,
            transport: self.transport,
            connected_at: self.connected_at,
            last_activity: self.last_activity(),
            alive: self.is_alive(),
        }
    }
}

/// Snapshot of endpoint info (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// Unique name
    pub name: String,
    /// Endpoint kind
    pub kind: EndpointKind,
    /// User id
    pub user_id: UserId,
    /// Transport
    pub transport: TransportMask,
    /// Connected at
    pub connected_at: DateTime<Utc>,
    /// Last activity
    pub last_activity: DateTime<Utc>,
    /// Is alive
    pub alive: bool,
}
