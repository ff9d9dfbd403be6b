use serde::{Deserialize, Serialize};

use umbra_transactions::Transaction;
use umbra_types::{blake2b_256, blake2b_256_parts, Hash32, PublicKey, Timestamp};

use crate::error::ChainError;
use crate::snapshot::ChainSnapshot;

pub fn block_key(height: u64) -> Vec<u8> {
    format!("blockHeight:{height}").into_bytes()
}

pub fn block_txs_key(height: u64) -> Vec<u8> {
    format!("blockTxs:{height}").into_bytes()
}

/// Block header. Heights are zero-based; a block at height `h` extends a
/// chain of `h` blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub prev_hash: Hash32,
    pub prev_kernel_hash: Hash32,
    /// Merkle root over the block's transaction hashes.
    pub merkle_hash: Hash32,
    pub timestamp: Timestamp,
    /// Per-block staking randomness.
    pub staking_nonce: Hash32,
    pub forger: PublicKey,
    pub signature: Vec<u8>,
}

impl Block {
    /// Block identity over the full serialized header.
    pub fn hash(&self) -> Result<Hash32, ChainError> {
        let bytes = bincode::serialize(self).map_err(|e| ChainError::Codec(e.to_string()))?;
        Ok(blake2b_256(&bytes))
    }

    /// Staking kernel: the stake-eligibility digest. Covers only the fields
    /// fixed before signing, so it is stable across re-signing.
    pub fn kernel_hash(&self) -> Hash32 {
        blake2b_256_parts(&[
            &self.height.to_le_bytes(),
            self.prev_kernel_hash.as_bytes(),
            &self.timestamp.as_secs().to_le_bytes(),
            self.staking_nonce.as_bytes(),
            self.forger.as_bytes(),
        ])
    }
}

/// A block header together with the transactions it includes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockComplete {
    pub block: Block,
    pub txs: Vec<Transaction>,
}

impl BlockComplete {
    pub fn merkle_root(&self) -> Result<Hash32, ChainError> {
        let mut layer = Vec::with_capacity(self.txs.len());
        for tx in &self.txs {
            layer.push(tx.hash()?);
        }
        Ok(fold_merkle(layer))
    }

    /// Structural linkage checks against the tip this block claims to
    /// extend. State-dependent validation happens during inclusion.
    pub fn validate(&self, parent: &ChainSnapshot) -> Result<(), ChainError> {
        if self.block.height != parent.height {
            return Err(ChainError::InvalidBlock(format!(
                "height {} does not extend chain at {}",
                self.block.height, parent.height
            )));
        }
        if self.block.prev_hash != parent.hash {
            return Err(ChainError::InvalidBlock("prev hash mismatch".into()));
        }
        if self.block.prev_kernel_hash != parent.kernel_hash {
            return Err(ChainError::InvalidBlock("prev kernel hash mismatch".into()));
        }
        if self.block.timestamp < parent.timestamp {
            return Err(ChainError::InvalidBlock("timestamp runs backwards".into()));
        }
        if self.merkle_root()? != self.block.merkle_hash {
            return Err(ChainError::InvalidBlock("merkle root mismatch".into()));
        }
        Ok(())
    }
}

fn fold_merkle(mut layer: Vec<Hash32>) -> Hash32 {
    if layer.is_empty() {
        return Hash32::ZERO;
    }
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2 + 1);
        for pair in layer.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            next.push(blake2b_256_parts(&[pair[0].as_bytes(), right.as_bytes()]));
        }
        layer = next;
    }
    layer[0]
}
