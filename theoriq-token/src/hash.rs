use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::address::strip_hex_prefix;

const HASH_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid payload hash '{input}': {reason}")]
pub struct HashError {
    pub input: String,
    pub reason: String,
}

/// SHA-256 digest of a request or response body.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadHash([u8; HASH_LEN]);

impl PayloadHash {
    /// Hashes `payload`.
    pub fn of(payload: &[u8]) -> Self {
        let digest = Sha256::digest(payload);
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parses `0x` + 64 hex characters (prefix and case are ignored).
    pub fn new(input: &str) -> Result<Self, HashError> {
        let digits = strip_hex_prefix(input.trim());
        if digits.len() != HASH_LEN * 2 {
            return Err(HashError {
                input: input.to_string(),
                reason: format!("expected {} hex characters", HASH_LEN * 2),
            });
        }
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| HashError {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// True when `payload` hashes to this value.
    pub fn matches(&self, payload: &[u8]) -> bool {
        *self == Self::of(payload)
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadHash({})", self)
    }
}

impl FromStr for PayloadHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for PayloadHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PayloadHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        PayloadHash::new(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hello")
    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_hash_of_payload() {
        let hash = PayloadHash::of(b"hello");
        assert_eq!(hash.to_string(), format!("0x{}", HELLO));
        assert!(hash.matches(b"hello"));
        assert!(!hash.matches(b"hello!"));
    }

    #[test]
    fn test_hash_parsing_is_case_and_prefix_insensitive() {
        let a = PayloadHash::new(HELLO).unwrap();
        let b = PayloadHash::new(&format!("0X{}", HELLO.to_uppercase())).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, PayloadHash::of(b"hello"));
    }

    #[test]
    fn test_hash_rejects_bad_input() {
        assert!(PayloadHash::new(&HELLO[..63]).is_err());
        let err = PayloadHash::new(&format!("{}g", &HELLO[..63])).unwrap_err();
        assert!(err.input.ends_with('g'));
    }
}
