//! Transport bitmask.

use std::fmt;
use std::str::FromStr;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// Bitmask of the transports that may carry a session's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportMask(pub u16);

impl TransportMask {
    /// No transports.
    pub const NONE: TransportMask = TransportMask(0x0000);
    /// Same-device transport.
    pub const LOCAL: TransportMask = TransportMask(0x0001);
    /// TCP transport.
    pub const TCP: TransportMask = TransportMask(0x0004);
    /// UDP transport.
    pub const UDP: TransportMask = TransportMask(0x0100);
    /// Placeholder bit for experimental transports.
    pub const EXPERIMENTAL: TransportMask = TransportMask(0x8000);
    /// Any IP-based transport.
    pub const IP: TransportMask = TransportMask(0x0004 | 0x0100);
    /// Any commercialized transport.
    pub const ANY: TransportMask = TransportMask(0x0001 | 0x0004 | 0x0100);

    /// Raw bits.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether any bit of `other` is also set here.
    pub fn intersects(self, other: TransportMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every bit of `other` is set here.
    pub fn contains(self, other: TransportMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// This mask with the bits of `other` cleared.
    pub fn without(self, other: TransportMask) -> TransportMask {
        TransportMask(self.0 & !other.0)
    }
}

impl BitOr for TransportMask {
    type Output = TransportMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        TransportMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for TransportMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TransportMask {
    type Output = TransportMask;

    fn bitand(self, rhs: Self) -> Self::Output {
        TransportMask(self.0 & rhs.0)
    }
}

impl BitAndAssign for TransportMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for TransportMask {
    type Output = TransportMask;

    fn not(self) -> Self::Output {
        TransportMask(!self.0)
    }
}

impl fmt::Display for TransportMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl FromStr for TransportMask {
    type Err = String;

    /// Parses `0x0105`, or names joined by `,` or `|` (`local`, `tcp`,
    /// `udp`, `ip`, `any`, `experimental`, `none`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u16::from_str_radix(hex, 16)
                .map(TransportMask)
                .map_err(|e| format!("invalid transport mask '{s}': {e}"));
        }

        let mut mask = TransportMask::NONE;
        for part in s.split([',', '|']).map(str::trim).filter(|p| !p.is_empty()) {
            mask |= match part.to_ascii_lowercase().as_str() {
                "none" => TransportMask::NONE,
                "local" => TransportMask::LOCAL,
                "tcp" => TransportMask::TCP,
                "udp" => TransportMask::UDP,
                "ip" => TransportMask::IP,
                "any" => TransportMask::ANY,
                "experimental" => TransportMask::EXPERIMENTAL,
                other => return Err(format!("unknown transport '{other}'")),
            };
        }
        Ok(mask)
    }
}
