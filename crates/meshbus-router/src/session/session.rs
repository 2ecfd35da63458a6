//! A single session with ordered membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshbus_core::types::{SessionId, SessionOpts, SessionPort};

/// Lifecycle of a session port / session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing reserved.
    Unbound,
    /// Port reserved, no members yet.
    Bound,
    /// At least one member.
    Active,
    /// Last member gone; the id no longer resolves.
    TornDown,
}

/// A live session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Port the session was joined through.
    pub port: SessionPort,
    /// Endpoint that bound the port.
    pub binder: String,
    /// Negotiated options.
    pub opts: SessionOpts,
    /// Members in join order.
    members: Vec<String>,
    /// Last committed event sequence.
    sequence: u64,
    /// When the first joiner was admitted.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session holding only its binder.
    pub fn new(id: SessionId, port: SessionPort, binder: String, opts: SessionOpts) -> Self {
        Self {
            id,
            port,
            members: vec![binder.clone()],
            binder,
            opts,
            sequence: 0,
            created_at: Utc::now(),
        }
    }

    /// Appends a member.
    pub fn add(&mut self, name: &str) {
        self.members.push(name.to_string());
        self.check_invariants();
    }

    /// Removes a member, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != name);
        before != self.members.len()
    }

    /// Whether `name` is a member.
    pub fn is_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    /// Members in join order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Whether no member remains.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Advances and returns the event sequence.
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Aborts on a corrupted membership list.
    pub fn check_invariants(&self) {
        for (i, m) in self.members.iter().enumerate() {
            assert!(
                !self.members[i + 1..].contains(m),
                "session {} lists member {m} twice",
                self.id
            );
        }
        assert!(
            self.opts.is_multipoint || self.members.len() <= 2,
            "point-to-point session {} holds {} members",
            self.id,
            self.members.len()
        );
    }

    /// Serializable view.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            port: self.port,
            binder: self.binder.clone(),
            opts: self.opts,
            members: self.members.clone(),
            created_at: self.created_at,
        }
    }
}

/// Serializable session view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session id
    pub id: SessionId,
    /// Port
    pub port: SessionPort,
    /// Binder
    pub binder: String,
    /// Options
    pub opts: SessionOpts,
    /// Members in join order
    pub members: Vec<String>,
    /// Created at
    pub created_at: DateTime<Utc>,
}
