use std::fmt;
use std::str::FromStr;

use biscuit_auth::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of bytes in an agent address.
pub const ADDRESS_LEN: usize = 32;

/// Raised when a string is not exactly 32 bytes of hex.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid agent address '{input}': {reason}")]
pub struct AddressError {
    pub input: String,
    pub reason: String,
}

impl AddressError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Identity of an agent: 32 bytes, written as `0x` followed by 64 hex characters.
///
/// Parsing accepts upper or lower case and an optional `0x` prefix, so two
/// addresses compare equal whenever their normalized hex matches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentAddress([u8; ADDRESS_LEN]);

impl AgentAddress {
    /// Parses an address from hex, with or without the `0x` prefix.
    pub fn new(input: &str) -> Result<Self, AddressError> {
        let digits = strip_hex_prefix(input.trim());
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::new(
                input,
                format!(
                    "expected {} hex characters, got {}",
                    ADDRESS_LEN * 2,
                    digits.len()
                ),
            ));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| AddressError::new(input, e.to_string()))?;
        Ok(Self(bytes))
    }

    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// The all-zero sentinel meaning "no address".
    pub const fn null() -> Self {
        Self([0u8; ADDRESS_LEN])
    }

    /// The address with value `1`.
    pub const fn one() -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[ADDRESS_LEN - 1] = 1;
        Self(bytes)
    }

    /// Derives the address of the holder of `key` (SHA-256 of the key bytes).
    pub fn from_public_key(key: &PublicKey) -> Self {
        let key_bytes = key.to_bytes();
        let digest = Sha256::digest(&key_bytes);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

pub(crate) fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentAddress({})", self)
    }
}

impl FromStr for AgentAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for AgentAddress {
    type Error = AddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for AgentAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AgentAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        AgentAddress::new(&value).map_err(serde::de::Error::custom)
    }
}
