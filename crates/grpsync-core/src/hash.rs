//! Content hashing for change detection.
//!
//! A content hash covers the semantically relevant fields of an aggregate in
//! a fixed order. It is stored in the extension payload of the metadata row
//! and compared on the next pass: an unchanged hash proves the local side has
//! not moved, which lets the engine skip redundant remote writes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte Blake3 content hash over canonicalized fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidHash(s.into()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHash(s.into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Builder hashing named fields in call order.
///
/// The encoding is length-prefixed so `("a", "bc")` and `("ab", "c")` never
/// collide, and a domain prefix keeps hashes from different schema versions
/// distinct.
pub struct ContentHasher {
    hasher: blake3::Hasher,
}

impl ContentHasher {
    pub fn new() -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"grpsync-content-v1:");
        Self { hasher }
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.hasher.update(&(name.len() as u64).to_le_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Hash an optional field; absence hashes differently from empty.
    pub fn opt_field(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.field(name, v).field("+", "1"),
            None => self.field(name, "").field("+", "0"),
        }
    }

    pub fn finish(self) -> ContentHash {
        ContentHash(*self.hasher.finalize().as_bytes())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = ContentHasher::new().field("title", "x").field("loc", "y").finish();
        let b = ContentHasher::new().field("title", "x").field("loc", "y").finish();
        assert_eq!(a, b);
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = ContentHasher::new().field("a", "bc").finish();
        let b = ContentHasher::new().field("ab", "c").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_absent_vs_empty() {
        let absent = ContentHasher::new().opt_field("loc", None).finish();
        let empty = ContentHasher::new().opt_field("loc", Some("")).finish();
        assert_ne!(absent, empty);
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = ContentHasher::new().field("k", "v").finish();
        let parsed = ContentHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(ContentHash::from_hex("zz").is_err());
        assert!(ContentHash::from_hex("abcd").is_err());
    }
}
