// ── Core identity types ──
//
// `Ieee` is the primary key of every device. `NetworkAddress` is the
// short address the mesh assigns and may change on rejoin.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid IEEE address '{input}': expected 16 hex digits, optionally prefixed with 0x")]
pub struct AddressParseError {
    input: String,
}

// ── Ieee ────────────────────────────────────────────────────────────

/// Stable 64-bit unique device address.
///
/// Displayed and serialized as `0x` followed by 16 lowercase hex digits
/// (e.g. `0x00158d0001234567`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ieee(u64);

impl Ieee {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ieee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl FromStr for Ieee {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 16 {
            return Err(AddressParseError { input: s.to_owned() });
        }

        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| AddressParseError { input: s.to_owned() })
    }
}

impl From<u64> for Ieee {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl Serialize for Ieee {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ieee {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── NetworkAddress ──────────────────────────────────────────────────

/// 16-bit short address assigned by the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkAddress(pub u16);

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}
