//! Bus message definitions.
//!
//! Payloads are opaque to the router; only the header fields below take
//! part in routing decisions.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshbus_core::types::SessionId;

/// Message type carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A method call expecting a reply.
    MethodCall,
    /// A successful method reply.
    MethodReturn,
    /// An error reply.
    Error,
    /// A signal; may be broadcast.
    Signal,
}

/// A routed bus message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message type.
    pub kind: MessageKind,
    /// Destination bus name. Empty for broadcast/session-cast signals.
    pub destination: String,
    /// Sender unique name, stamped by the router.
    #[serde(default)]
    pub sender: String,
    /// Session the message belongs to, if any.
    pub session_id: Option<SessionId>,
    /// Sender-assigned serial number.
    pub serial: u32,
    /// Marshaled body, never inspected by the router.
    pub payload: Bytes,
    /// When the router accepted the message.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message addressed to `destination`.
    pub fn new(kind: MessageKind, destination: impl Into<String>, payload: Bytes) -> Self {
        Self {
            kind,
            destination: destination.into(),
            sender: String::new(),
            session_id: None,
            serial: 0,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Create a method call.
    pub fn method_call(destination: impl Into<String>, payload: Bytes) -> Self {
        Self::new(MessageKind::MethodCall, destination, payload)
    }

    /// Create a signal. An empty destination broadcasts it.
    pub fn signal(destination: impl Into<String>, payload: Bytes) -> Self {
        Self::new(MessageKind::Signal, destination, payload)
    }

    /// Scope the message to a session.
    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Set the serial number.
    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    /// Whether the message has no explicit destination.
    pub fn is_broadcast(&self) -> bool {
        self.destination.is_empty()
    }
}
