//! EVM addresses
//!
//! Canonical form is lower-case hex with a `0x` prefix. Parsing accepts any
//! case and an optional prefix; anything that is not exactly 20 bytes of hex
//! is rejected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 20-byte EVM account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

/// Token contracts are plain addresses; the alias keeps call sites readable.
pub type TokenAddress = Address;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must be 40 hex digits, got {0}")]
    BadLength(usize),

    #[error("address contains non-hex characters")]
    NotHex,
}

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse an address, normalizing case.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(AddressError::BadLength(digits.len()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::NotHex)?;
        Ok(Self(bytes))
    }
}

/// Whether `input` is a well-formed 20-byte hex address.
pub fn is_valid_address(input: &str) -> bool {
    Address::parse(input).is_ok()
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let addr = Address::parse("0x04D388DA70C32FC5876981097C536C51C8D3D236").unwrap();
        assert_eq!(addr.to_string(), "0x04d388da70c32fc5876981097c536c51c8d3d236");
    }

    #[test]
    fn test_parse_accepts_missing_prefix() {
        let addr = Address::parse("04d388da70c32fc5876981097c536c51c8d3d236").unwrap();
        assert_eq!(addr.as_bytes()[0], 0x04);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Address::parse(""), Err(AddressError::BadLength(0)));
        assert_eq!(Address::parse("0x1234"), Err(AddressError::BadLength(4)));
        assert_eq!(
            Address::parse("0xzzd388da70c32fc5876981097c536c51c8d3d236"),
            Err(AddressError::NotHex)
        );
        assert!(!is_valid_address("0x04d388da70c32fc5876981097c536c51c8d3d2366"));
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let addr = Address::parse("0x4200000000000000000000000000000000000006").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x4200000000000000000000000000000000000006\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
