//! Exact tier: SHA3-256 digest of the complete byte buffer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};

use crate::error::FirstmarkError;

/// Digest size in bytes.
pub const EXACT_HASH_SIZE: usize = 32;

/// 256-bit cryptographic digest identifying byte-identical content.
///
/// Serialized as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExactHash([u8; EXACT_HASH_SIZE]);

impl ExactHash {
    /// The all-zero value. Never produced by hashing in practice and always
    /// rejected by the registry.
    pub const ZERO: Self = Self([0u8; EXACT_HASH_SIZE]);

    /// Hash raw content bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut digest = [0u8; EXACT_HASH_SIZE];
        digest.copy_from_slice(&result);
        Self(digest)
    }

    /// Wrap an already-computed digest.
    pub const fn from_digest(digest: [u8; EXACT_HASH_SIZE]) -> Self {
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; EXACT_HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; EXACT_HASH_SIZE]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 bytes as hex, for log lines and terminal output.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for ExactHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ExactHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExactHash({})", self.short())
    }
}

impl FromStr for ExactHash {
    type Err = FirstmarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| {
            FirstmarkError::InvalidFingerprint(format!("Invalid exact hash hex: {}", e))
        })?;
        let digest: [u8; EXACT_HASH_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            FirstmarkError::InvalidFingerprint(format!(
                "Exact hash must be {} bytes, got {}",
                EXACT_HASH_SIZE,
                b.len()
            ))
        })?;
        Ok(Self(digest))
    }
}

impl Serialize for ExactHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ExactHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
