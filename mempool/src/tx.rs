use std::sync::Arc;

use umbra_transactions::Transaction;
use umbra_types::{blake2b_256, Hash32, PublicKey};

use crate::error::MempoolError;

/// A candidate transaction with its scheduling metadata precomputed at
/// admission.
#[derive(Debug)]
pub struct MempoolTx {
    pub tx: Arc<Transaction>,
    pub hash: Hash32,
    pub size: u64,
    pub fee: u64,
    pub fee_per_byte: u64,
    /// Ordering nonce; only simple transactions carry one.
    pub nonce: Option<u64>,
    pub sender: Option<PublicKey>,
}

impl MempoolTx {
    /// Admission constructor: enforces the minimum fee-per-byte policy.
    pub fn new(tx: Transaction) -> Result<Self, MempoolError> {
        let tx = Self::build(tx)?;
        if tx.fee_per_byte == 0 {
            return Err(MempoolError::FeeTooLow {
                fee: tx.fee,
                size: tx.size,
            });
        }
        Ok(tx)
    }

    /// Constructor for a transaction coming back off the chain after a
    /// rewind. It was included once, so the admission fee floor does not
    /// apply; the next pass re-validates it anyway.
    pub fn recovered(tx: Transaction) -> Result<Self, MempoolError> {
        Self::build(tx)
    }

    fn build(tx: Transaction) -> Result<Self, MempoolError> {
        let bytes = tx.to_bytes()?;
        let size = bytes.len() as u64;
        let fee = tx.fee()?;
        let sender = match &tx {
            Transaction::Simple(simple) => Some(simple.sender),
            Transaction::Confidential(_) => None,
        };
        Ok(Self {
            nonce: tx.nonce(),
            sender,
            hash: blake2b_256(&bytes),
            size,
            fee,
            fee_per_byte: fee / size,
            tx: Arc::new(tx),
        })
    }
}

/// Order candidates for inclusion: fee-per-byte descending; within an
/// equal-fee run, nonce-bearing transactions by ascending nonce while
/// everything else keeps its arrival slot.
///
/// The nonce rule is applied per run by slot reassignment rather than in
/// the comparator: ordering nonces against nonce-less entries pairwise is
/// not a total order, which `sort_by` requires.
pub fn sort_candidates(list: &mut [Arc<MempoolTx>]) {
    // Stable, so equal fee-per-byte preserves arrival order.
    list.sort_by(|a, b| b.fee_per_byte.cmp(&a.fee_per_byte));
    let mut start = 0;
    while start < list.len() {
        let fee = list[start].fee_per_byte;
        let mut end = start + 1;
        while end < list.len() && list[end].fee_per_byte == fee {
            end += 1;
        }
        order_nonces(&mut list[start..end]);
        start = end;
    }
}

/// Arrange the nonce-bearing entries of an equal-fee run in ascending
/// nonce order, each taking one of the slots the group already occupies.
fn order_nonces(run: &mut [Arc<MempoolTx>]) {
    let slots: Vec<usize> = run
        .iter()
        .enumerate()
        .filter(|(_, tx)| tx.nonce.is_some())
        .map(|(slot, _)| slot)
        .collect();
    if slots.len() < 2 {
        return;
    }
    let mut entries: Vec<Arc<MempoolTx>> =
        slots.iter().map(|&slot| Arc::clone(&run[slot])).collect();
    entries.sort_by_key(|tx| tx.nonce);
    for (slot, entry) in slots.into_iter().zip(entries) {
        run[slot] = entry;
    }
}

/// A published scheduling result: the candidate set chosen for one chain tip.
#[derive(Debug)]
pub struct MempoolResult {
    pub chain_hash: Hash32,
    pub chain_height: u64,
    pub txs: Vec<Arc<MempoolTx>>,
    pub total_size: u64,
}
