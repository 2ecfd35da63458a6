//! Numeric newtype identifiers for sessions, session ports, and users.
//!
//! Using distinct types prevents accidentally passing a `SessionPort` where
//! a `SessionId` is expected.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Macro to define a newtype ID wrapper around an unsigned integer.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Return the raw numeric value.
            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<$inner>().map(Self)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> $inner {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of an active session. Never zero.
    SessionId(u32)
);

define_id!(
    /// A session port reserved by a binder.
    SessionPort(u16)
);

define_id!(
    /// Authenticated user/credential id attached to an endpoint.
    UserId(u32)
);

impl SessionPort {
    /// Ask the session table to pick a free port.
    pub const ANY: SessionPort = SessionPort(0);

    /// Whether this is the wildcard port.
    pub fn is_any(self) -> bool {
        self.0 == 0
    }
}

impl UserId {
    /// Marker for "no authenticated user".
    pub const INVALID: UserId = UserId(u32::MAX);

    /// Whether this id refers to an actual user.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}
