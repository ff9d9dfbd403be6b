//! Blake2b-256 digests for blocks, kernels and transactions.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::Hash32;

type Blake2b256 = Blake2b<U32>;

/// Digest a single byte slice into a [`Hash32`].
pub fn blake2b_256(data: &[u8]) -> Hash32 {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash32::new(out)
}

/// Digest several byte slices in sequence without concatenating them.
pub fn blake2b_256_parts(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash32::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(blake2b_256(b"umbra"), blake2b_256(b"umbra"));
        assert_ne!(blake2b_256(b"umbra"), blake2b_256(b"arbmu"));
    }

    #[test]
    fn parts_match_concatenation() {
        let whole = blake2b_256(b"kernelhash");
        let split = blake2b_256_parts(&[b"kernel", b"hash"]);
        assert_eq!(whole, split);
    }
}
