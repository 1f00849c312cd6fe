//! EVM account and contract addresses.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an EVM address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of a hex-encoded 32-byte word including the `0x` prefix.
const TOPIC_HEX_LEN: usize = 66;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("missing 0x prefix: {0}")]
    MissingPrefix(String),
    #[error("expected 40 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// 20-byte EVM address.
///
/// Parsing is case-insensitive (checksummed and lowercase forms are equal);
/// display is always lowercase `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address used as mint/burn counterparty.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Conventional burn sink `0x000000000000000000000000000000000000dEaD`.
    pub const DEAD: Address = Address([
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xde, 0xad,
    ]);

    /// Create from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Recover an address from an indexed event topic.
    ///
    /// Topics are 32-byte words, left-padded with zeros; the address is the
    /// low 20 bytes. Returns `None` for anything that is not `0x` + 64 hex chars.
    pub fn from_topic(topic: &str) -> Option<Self> {
        if topic.len() != TOPIC_HEX_LEN || !has_hex_prefix(topic) {
            return None;
        }
        let word = hex::decode(&topic[2..]).ok()?;
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&word[32 - ADDRESS_LEN..]);
        Some(Self(bytes))
    }

    /// Parse an optional JSON-RPC field, treating malformed values as absent.
    pub fn parse_opt(value: Option<&str>) -> Option<Self> {
        value.and_then(|s| s.parse().ok())
    }

    /// True for the zero address and the conventional burn sink.
    pub fn is_placeholder(&self) -> bool {
        *self == Self::ZERO || *self == Self::DEAD
    }

    /// Abbreviated form for log lines and alerts: `0x1234...abcd`.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

fn has_hex_prefix(s: &str) -> bool {
    s.starts_with("0x") || s.starts_with("0X")
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !has_hex_prefix(s) {
            return Err(AddressError::MissingPrefix(s.to_string()));
        }
        let body = &s[2..];
        if body.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::InvalidLength(body.len()));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
