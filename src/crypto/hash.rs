//! BLAKE3 content hashing
//!
//! Transactions and blocks are identified by the BLAKE3 digest of their
//! canonical byte encoding. The ledger treats the result as an opaque,
//! comparable 32-byte value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte hash output
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// All-zero hash, never produced by a real digest
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Parse a 64-character hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Hash(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

/// Hash arbitrary bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> Hash {
    let hash = blake3::hash(data);
    Hash(*hash.as_bytes())
}

/// Hash a sequence of byte slices as if they were concatenated
pub fn hash_parts<'a, I>(parts: I) -> Hash
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash_bytes(b"hello world"), hash_bytes(b"hello world"));
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn test_hash_parts_matches_concatenation() {
        let whole = hash_bytes(b"left-right");
        let parts = hash_parts([b"left".as_slice(), b"-".as_slice(), b"right".as_slice()]);
        assert_eq!(whole, parts);
    }

    #[test]
    fn test_hex_parse() {
        let hash = hash_bytes(b"test");
        assert_eq!(Hash::from_hex(&hash.to_hex()).unwrap(), hash);
        assert!(Hash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_short_form() {
        let hash = Hash([0xab; 32]);
        assert_eq!(hash.short(), "abababab");
    }
}
