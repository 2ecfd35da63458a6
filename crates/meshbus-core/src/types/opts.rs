//! Session options negotiated between a binder and its joiners.

use serde::{Deserialize, Serialize};

use super::transport::TransportMask;

/// Kind of traffic a session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficType {
    /// Bus messages (method calls, signals, properties).
    #[default]
    Messages,
    /// Raw unreliable byte stream.
    RawUnreliable,
    /// Raw reliable byte stream.
    RawReliable,
}

/// Physical reach allowed for session members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    /// No restriction.
    #[default]
    Any,
    /// Same physical device/network segment only.
    Physical,
    /// Reachable over the network.
    Network,
}

impl Proximity {
    fn bits(self) -> u8 {
        match self {
            Proximity::Any => 0xFF,
            Proximity::Physical => 0x01,
            Proximity::Network => 0x02,
        }
    }
}

/// Options a session port is bound with, or a joiner asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOpts {
    /// Traffic type.
    #[serde(default)]
    pub traffic: TrafficType,
    /// Whether more than two members are allowed.
    #[serde(default)]
    pub is_multipoint: bool,
    /// Proximity restriction.
    #[serde(default)]
    pub proximity: Proximity,
    /// Transports that may carry the session.
    #[serde(default = "default_transports")]
    pub transports: TransportMask,
}

impl SessionOpts {
    /// Options for a message-based session.
    pub fn new(is_multipoint: bool, transports: TransportMask) -> Self {
        Self {
            traffic: TrafficType::Messages,
            is_multipoint,
            proximity: Proximity::Any,
            transports,
        }
    }

    /// Whether a joiner asking for `other` can join a port bound with `self`.
    pub fn is_compatible(&self, other: &SessionOpts) -> bool {
        self.traffic == other.traffic
            && self.is_multipoint == other.is_multipoint
            && self.proximity.bits() & other.proximity.bits() != 0
            && self.transports.intersects(other.transports)
    }

    /// The options granted to a compatible joiner.
    pub fn negotiate(&self, other: &SessionOpts) -> SessionOpts {
        SessionOpts {
            transports: self.transports & other.transports,
            ..*self
        }
    }
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self::new(false, default_transports())
    }
}

fn default_transports() -> TransportMask {
    TransportMask::ANY
}
