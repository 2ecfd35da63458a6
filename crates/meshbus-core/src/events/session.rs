//! Session membership events and session-lost reasons.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a session ended for a particular member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionLostReason {
    /// The peer called leave.
    RemoteEndLeftSession,
    /// The peer disconnected without leaving.
    RemoteEndClosedAbruptly,
    /// The binder removed this member.
    RemovedByBinder,
    /// The peer's link went silent past its timeout.
    LinkTimeout,
    /// Any other cause.
    Other,
}

impl fmt::Display for SessionLostReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteEndLeftSession => write!(f, "remote end left session"),
            Self::RemoteEndClosedAbruptly => write!(f, "remote end closed abruptly"),
            Self::RemovedByBinder => write!(f, "removed by binder"),
            Self::LinkTimeout => write!(f, "link timeout"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Events delivered to session listeners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// The session is over for the receiving endpoint.
    Lost {
        /// Why it ended.
        reason: SessionLostReason,
    },
    /// Another endpoint joined the session.
    MemberAdded {
        /// The new member's unique name.
        unique_name: String,
    },
    /// Another endpoint left or was removed from the session.
    MemberRemoved {
        /// The departed member's unique name.
        unique_name: String,
    },
}

impl SessionEvent {
    /// Short event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lost { .. } => "session_lost",
            Self::MemberAdded { .. } => "member_added",
            Self::MemberRemoved { .. } => "member_removed",
        }
    }
}
