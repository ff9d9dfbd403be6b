//! The chain engine: applies and removes blocks inside single store
//! transactions, publishes the tip snapshot atomically, and coordinates with
//! the mempool worker around every mutation.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use umbra_mempool::{ContinueMode, Mempool};
use umbra_state::{StateAggregate, NATIVE_ASSET_ID};
use umbra_store::{Store, StoreWriter};
use umbra_transactions::{inclusion_key, tx_key, Transaction};
use umbra_types::Hash32;

use crate::block::{block_key, block_txs_key, BlockComplete};
use crate::error::ChainError;
use crate::genesis::{self, GenesisData, NATIVE_DECIMALS};
use crate::reward::reward_at;
use crate::snapshot::ChainSnapshot;

pub struct ChainState<S: Store> {
    store: Arc<S>,
    mempool: Mempool,
    snapshot: ArcSwap<ChainSnapshot>,
    /// Serializes add/rewind; readers never take it.
    write_lock: Mutex<()>,
}

impl<S: Store> ChainState<S> {
    /// Open the chain, creating genesis state on an empty store.
    pub fn init(
        store: Arc<S>,
        mempool: Mempool,
        genesis: &GenesisData,
    ) -> Result<Self, ChainError> {
        let snapshot = store.update(|w| match ChainSnapshot::load_latest(w)? {
            Some(snapshot) => Ok(snapshot),
            None => genesis::initialize_chain(w, genesis),
        })?;
        tracing::info!(height = snapshot.height, hash = %snapshot.hash, "chain opened");
        Ok(Self {
            store,
            mempool,
            snapshot: ArcSwap::from_pointee(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    /// The current tip, atomically published. Lock-free.
    pub fn snapshot(&self) -> Arc<ChainSnapshot> {
        self.snapshot.load_full()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Validate and apply consecutive blocks as one atomic batch. Either
    /// every block lands and the new tip is published, or the store keeps
    /// the old tip untouched. Returns the kernel hash of the last block.
    pub async fn add_blocks(&self, blocks: Vec<BlockComplete>) -> Result<Hash32, ChainError> {
        if blocks.is_empty() {
            return Err(ChainError::NoBlocks);
        }
        let _guard = self.write_lock.lock().await;
        self.mempool.suspend().await?;
        match self.apply_blocks(&blocks) {
            Ok((snapshot, included)) => {
                let (hash, height, kernel) = (snapshot.hash, snapshot.height, snapshot.kernel_hash);
                tracing::info!(height, hash = %hash, txs = included.len(), "chain advanced");
                self.snapshot.store(Arc::new(snapshot));
                self.mempool.resume(ContinueMode::NoError).await?;
                self.mempool.remove_transactions(included).await?;
                self.mempool.update_work(hash, height).await?;
                Ok(kernel)
            }
            Err(err) => {
                tracing::warn!(error = %err, "block batch rejected");
                self.mempool.resume(ContinueMode::Error).await?;
                let snapshot = self.snapshot.load_full();
                self.mempool.update_work(snapshot.hash, snapshot.height).await?;
                Err(err)
            }
        }
    }

    /// Unwind the chain back to `target` blocks. Removed transactions are
    /// re-queued into the mempool for the next pass.
    pub async fn rewind(&self, target: u64) -> Result<(), ChainError> {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot.load_full();
        if target >= current.height {
            return Err(ChainError::InvalidRewindTarget {
                target,
                height: current.height,
            });
        }
        self.mempool.suspend().await?;
        match self.unwind_to(&current, target) {
            Ok((snapshot, orphaned)) => {
                let (hash, height) = (snapshot.hash, snapshot.height);
                tracing::info!(height, orphaned = orphaned.len(), "chain rewound");
                self.snapshot.store(Arc::new(snapshot));
                self.mempool.resume(ContinueMode::NoError).await?;
                self.mempool.insert_transactions(orphaned).await?;
                self.mempool.update_work(hash, height).await?;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, target, "rewind failed");
                self.mempool.resume(ContinueMode::Error).await?;
                Err(err)
            }
        }
    }

    fn apply_blocks(
        &self,
        blocks: &[BlockComplete],
    ) -> Result<(ChainSnapshot, Vec<Hash32>), ChainError> {
        self.store.update(|w| {
            let mut snapshot = (*self.snapshot.load_full()).clone();
            let mut aggregate = StateAggregate::new(w)?;
            let mut included = Vec::new();

            for complete in blocks {
                complete.validate(&snapshot)?;
                let height = complete.block.height;

                let mut tx_hashes = Vec::with_capacity(complete.txs.len());
                for tx in &complete.txs {
                    let hash = tx.hash()?;
                    if w.exists(&inclusion_key(&hash))? {
                        return Err(ChainError::TransactionAlreadyIncluded(hash));
                    }
                    tx.include(w, &mut aggregate, height)?;
                    tx_hashes.push(hash);
                }
                self.mint_reward(w, &mut aggregate, complete)?;

                aggregate.write_transition_logs(w, height)?;
                aggregate.commit_changes(w)?;

                for (hash, tx) in tx_hashes.iter().zip(&complete.txs) {
                    w.put(&inclusion_key(hash), &[1])?;
                    w.put(&tx_key(hash), &tx.to_bytes()?)?;
                }
                let hashes_bytes = bincode::serialize(&tx_hashes)
                    .map_err(|e| ChainError::Codec(e.to_string()))?;
                w.put(&block_txs_key(height), &hashes_bytes)?;
                let block_bytes = bincode::serialize(&complete.block)
                    .map_err(|e| ChainError::Codec(e.to_string()))?;
                w.put(&block_key(height), &block_bytes)?;

                snapshot = ChainSnapshot {
                    height: height + 1,
                    hash: complete.block.hash()?,
                    prev_hash: complete.block.prev_hash,
                    kernel_hash: complete.block.kernel_hash(),
                    prev_kernel_hash: complete.block.prev_kernel_hash,
                    timestamp: complete.block.timestamp,
                    target: snapshot.target,
                    transactions_count: snapshot.transactions_count + tx_hashes.len() as u64,
                    accounts_count: aggregate.registrations.count(),
                    assets_count: aggregate.assets.count(),
                };
                snapshot.save(w, false)?;
                included.extend(tx_hashes);
            }

            aggregate.write_to_store(w)?;
            snapshot.save(w, true)?;
            Ok((snapshot, included))
        })
    }

    fn mint_reward(
        &self,
        w: &mut dyn StoreWriter,
        aggregate: &mut StateAggregate,
        complete: &BlockComplete,
    ) -> Result<(), ChainError> {
        let reward = reward_at(complete.block.height, NATIVE_DECIMALS)?;
        if reward == 0 {
            return Ok(());
        }
        let mut native = aggregate
            .get_asset(w, &NATIVE_ASSET_ID)?
            .ok_or_else(|| ChainError::InvalidBlock("native asset missing".into()))?;
        native.add_supply(&NATIVE_ASSET_ID, reward)?;
        aggregate.update_asset(&NATIVE_ASSET_ID, native);

        let forger = complete.block.forger;
        aggregate.create_registration(w, &forger, true, None)?;
        let mut account = aggregate.create_account(w, &NATIVE_ASSET_ID, &forger)?;
        account.credit(reward)?;
        aggregate.update_account(&NATIVE_ASSET_ID, &forger, account);
        Ok(())
    }

    fn unwind_to(
        &self,
        current: &ChainSnapshot,
        target: u64,
    ) -> Result<(ChainSnapshot, Vec<Transaction>), ChainError> {
        self.store.update(|w| {
            let mut aggregate = StateAggregate::new(w)?;
            let mut orphaned = Vec::new();

            for height in (target..current.height).rev() {
                remove_block(w, &mut aggregate, height, &mut orphaned)?;
            }
            aggregate.commit_changes(w)?;
            aggregate.write_to_store(w)?;

            let snapshot = ChainSnapshot::load_at(w, target)?
                .ok_or(ChainError::MissingSnapshot(target))?;
            for height in target + 1..=current.height {
                ChainSnapshot::delete_at(w, height)?;
            }
            snapshot.save(w, true)?;
            Ok((snapshot, orphaned))
        })
    }
}

/// Reverse one block: delete its records and stage the transition-log
/// restore of every collection it touched.
fn remove_block(
    w: &mut dyn StoreWriter,
    aggregate: &mut StateAggregate,
    height: u64,
    orphaned: &mut Vec<Transaction>,
) -> Result<(), ChainError> {
    let hashes_bytes = w
        .get(&block_txs_key(height))?
        .ok_or(ChainError::MissingBlock(height))?;
    let tx_hashes: Vec<Hash32> =
        bincode::deserialize(&hashes_bytes).map_err(|e| ChainError::Codec(e.to_string()))?;

    for hash in &tx_hashes {
        w.delete(&inclusion_key(hash))?;
        if let Some(tx_bytes) = w.get(&tx_key(hash))? {
            orphaned.push(Transaction::from_bytes(&tx_bytes)?);
            w.delete(&tx_key(hash))?;
        }
    }
    aggregate.apply_transition_logs(w, height)?;
    w.delete(&block_txs_key(height))?;
    w.delete(&block_key(height))?;
    Ok(())
}
