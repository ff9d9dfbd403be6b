//! The 32-byte hash used for blocks, kernel hashes and transactions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte Blake2b-256 digest.
///
/// Used as the identity of blocks, transactions and proof-of-stake kernels.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash32([u8; 32]);

impl Hash32 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse from a byte slice; fails unless exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        assert!(Hash32::ZERO.is_zero());
        assert!(!Hash32::new([1u8; 32]).is_zero());
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Hash32::from_slice(&[0u8; 31]).is_none());
        assert!(Hash32::from_slice(&[0u8; 33]).is_none());
        assert!(Hash32::from_slice(&[7u8; 32]).is_some());
    }

    #[test]
    fn display_is_hex() {
        let h = Hash32::new([0xab; 32]);
        assert_eq!(h.to_string(), "ab".repeat(32));
    }
}
