//! Public key material used as account and registration identity.
//!
//! Umbra accounts are keyed by 33-byte compressed curve points. The curve
//! arithmetic itself (signatures, balance proofs) lives outside this
//! workspace; here a key is opaque identity bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Compressed public key length in bytes.
pub const PUBLIC_KEY_SIZE: usize = 33;

/// A 33-byte compressed public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parse from a byte slice; fails unless exactly 33 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}…)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> serde::de::Visitor<'de> for KeyVisitor {
            type Value = PublicKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{} bytes", PUBLIC_KEY_SIZE)
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                PublicKey::from_slice(v).ok_or_else(|| E::invalid_length(v.len(), &self))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Self::Value, A::Error> {
                let mut arr = [0u8; PUBLIC_KEY_SIZE];
                for (i, byte) in arr.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(PublicKey(arr))
            }
        }

        deserializer.deserialize_bytes(KeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_checks_length() {
        assert!(PublicKey::from_slice(&[1u8; 32]).is_none());
        assert!(PublicKey::from_slice(&[1u8; 33]).is_some());
    }

    #[test]
    fn serde_round_trip() {
        let key = PublicKey([0x42; PUBLIC_KEY_SIZE]);
        let bytes = bincode::serialize(&key).unwrap();
        let back: PublicKey = bincode::deserialize(&bytes).unwrap();
        assert_eq!(key, back);
    }
}
