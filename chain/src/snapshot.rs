use serde::{Deserialize, Serialize};

use umbra_store::{StoreReader, StoreWriter};
use umbra_types::{Hash32, Timestamp};

use crate::error::ChainError;

const LATEST_KEY: &[u8] = b"chainData";

fn height_key(height: u64) -> Vec<u8> {
    format!("chainData:{height}").into_bytes()
}

/// Immutable description of the chain after a given number of blocks.
///
/// The live copy is published atomically by the chain; readers clone the
/// `Arc` and never see a half-applied mutation. A copy is also persisted per
/// height so a rewind can reinstate an old tip without recomputing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Number of blocks applied; the next block carries this height.
    pub height: u64,
    pub hash: Hash32,
    pub prev_hash: Hash32,
    pub kernel_hash: Hash32,
    pub prev_kernel_hash: Hash32,
    pub timestamp: Timestamp,
    /// Proof-of-stake difficulty target, carried forward unchanged.
    pub target: Hash32,
    pub transactions_count: u64,
    pub accounts_count: u64,
    pub assets_count: u64,
}

impl ChainSnapshot {
    pub fn save<W: StoreWriter + ?Sized>(
        &self,
        store: &mut W,
        latest: bool,
    ) -> Result<(), ChainError> {
        let bytes = bincode::serialize(self).map_err(|e| ChainError::Codec(e.to_string()))?;
        store.put(&height_key(self.height), &bytes)?;
        if latest {
            store.put(LATEST_KEY, &bytes)?;
        }
        Ok(())
    }

    pub fn load_latest<R: StoreReader + ?Sized>(store: &R) -> Result<Option<Self>, ChainError> {
        decode_optional(store.get(LATEST_KEY)?)
    }

    pub fn load_at<R: StoreReader + ?Sized>(
        store: &R,
        height: u64,
    ) -> Result<Option<Self>, ChainError> {
        decode_optional(store.get(&height_key(height))?)
    }

    pub fn delete_at<W: StoreWriter + ?Sized>(
        store: &mut W,
        height: u64,
    ) -> Result<(), ChainError> {
        store.delete(&height_key(height))?;
        Ok(())
    }
}

fn decode_optional(bytes: Option<Vec<u8>>) -> Result<Option<ChainSnapshot>, ChainError> {
    match bytes {
        Some(bytes) => bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| ChainError::Codec(e.to_string())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_store::{MemoryStore, Store};

    #[test]
    fn save_and_load_per_height_and_latest() {
        let store = MemoryStore::new();
        let snapshot = ChainSnapshot {
            height: 3,
            hash: Hash32::new([1; 32]),
            prev_hash: Hash32::new([2; 32]),
            kernel_hash: Hash32::new([3; 32]),
            prev_kernel_hash: Hash32::new([4; 32]),
            timestamp: Timestamp::new(99),
            target: Hash32::new([0xff; 32]),
            transactions_count: 7,
            accounts_count: 2,
            assets_count: 1,
        };
        store
            .update(|w| {
                snapshot.save(w, true)?;
                assert_eq!(ChainSnapshot::load_latest(w)?, Some(snapshot.clone()));
                assert_eq!(ChainSnapshot::load_at(w, 3)?, Some(snapshot.clone()));
                assert_eq!(ChainSnapshot::load_at(w, 2)?, None);
                ChainSnapshot::delete_at(w, 3)?;
                assert_eq!(ChainSnapshot::load_at(w, 3)?, None);
                Ok::<_, ChainError>(())
            })
            .unwrap();
    }
}
