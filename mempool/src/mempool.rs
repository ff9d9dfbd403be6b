use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};

use arc_swap::ArcSwapOption;
use umbra_store::Store;
use umbra_transactions::Transaction;
use umbra_types::{Hash32, PublicKey};

use crate::error::MempoolError;
use crate::tx::{MempoolResult, MempoolTx};
use crate::worker::{
    AddRequest, ContinueMode, InsertRequest, MempoolConfig, MempoolWorker, RemoveRequest,
    WorkTarget,
};

/// Cloneable handle to the mempool worker.
///
/// Candidate-list state lives on the worker task; the handle only sends
/// signals and reads the lock-free published result and the shared
/// transaction registry.
#[derive(Clone)]
pub struct Mempool {
    suspend_tx: mpsc::Sender<oneshot::Sender<()>>,
    work_tx: mpsc::Sender<WorkTarget>,
    continue_tx: mpsc::Sender<ContinueMode>,
    remove_tx: mpsc::Sender<RemoveRequest>,
    insert_tx: mpsc::Sender<InsertRequest>,
    admit_tx: mpsc::Sender<AddRequest>,
    registry: Arc<RwLock<HashMap<Hash32, Arc<MempoolTx>>>>,
    result: Arc<ArcSwapOption<MempoolResult>>,
}

impl Mempool {
    /// Build the handle and its worker. The caller spawns
    /// [`MempoolWorker::run`] on its runtime.
    pub fn new<S: Store + 'static>(store: Arc<S>, config: MempoolConfig) -> (Self, MempoolWorker<S>) {
        let (suspend_tx, suspend_rx) = mpsc::channel(4);
        let (work_tx, work_rx) = mpsc::channel(16);
        let (continue_tx, continue_rx) = mpsc::channel(4);
        let (remove_tx, remove_rx) = mpsc::channel(64);
        let (insert_tx, insert_rx) = mpsc::channel(64);
        let (admit_tx, add_rx) = mpsc::channel(256);
        let registry = Arc::new(RwLock::new(HashMap::new()));
        let result = Arc::new(ArcSwapOption::empty());
        let worker = MempoolWorker::new(
            store,
            config,
            Arc::clone(&registry),
            Arc::clone(&result),
            suspend_rx,
            work_rx,
            continue_rx,
            remove_rx,
            insert_rx,
            add_rx,
        );
        (
            Self {
                suspend_tx,
                work_tx,
                continue_tx,
                remove_tx,
                insert_tx,
                admit_tx,
                registry,
                result,
            },
            worker,
        )
    }

    /// Admit a transaction. `Ok(true)` means newly admitted, `Ok(false)`
    /// that it was already known; a rejection verdict comes back as an
    /// error. Admission waits until the worker has a work target.
    ///
    /// `chain_height` is the tip height the submitter validated against;
    /// the worker revalidates at its own target and only notes a mismatch.
    pub async fn add_tx(&self, tx: Transaction, chain_height: u64) -> Result<bool, MempoolError> {
        let tx = Arc::new(MempoolTx::new(tx)?);
        if self.contains(&tx.hash) {
            return Ok(false);
        }
        let (reply, response) = oneshot::channel();
        self.admit_tx
            .send(AddRequest {
                tx,
                chain_height,
                reply,
            })
            .await
            .map_err(|_| MempoolError::WorkerGone)?;
        response.await.map_err(|_| MempoolError::WorkerGone)?
    }

    /// Drop transactions, typically because a block just included them.
    /// Returns whether anything was removed.
    pub async fn remove_transactions(&self, hashes: Vec<Hash32>) -> Result<bool, MempoolError> {
        if hashes.is_empty() {
            return Ok(false);
        }
        let (reply, response) = oneshot::channel();
        self.remove_tx
            .send(RemoveRequest { hashes, reply })
            .await
            .map_err(|_| MempoolError::WorkerGone)?;
        response.await.map_err(|_| MempoolError::WorkerGone)
    }

    /// Re-queue transactions orphaned by a rewind, without re-validating
    /// them here; the next pass will.
    pub async fn insert_transactions(&self, txs: Vec<Transaction>) -> Result<bool, MempoolError> {
        let mut candidates = Vec::with_capacity(txs.len());
        for tx in txs {
            // Recovered transactions were included once, so the admission
            // fee floor does not apply; a transaction that still cannot be
            // queued is dropped rather than failing the batch.
            match MempoolTx::recovered(tx) {
                Ok(tx) => candidates.push(Arc::new(tx)),
                Err(err) => tracing::warn!(error = %err, "skipping unqueueable transaction"),
            }
        }
        if candidates.is_empty() {
            return Ok(false);
        }
        let (reply, response) = oneshot::channel();
        self.insert_tx
            .send(InsertRequest { txs: candidates, reply })
            .await
            .map_err(|_| MempoolError::WorkerGone)?;
        response.await.map_err(|_| MempoolError::WorkerGone)
    }

    /// Point the worker at a new chain tip, restarting its scheduling pass.
    pub async fn update_work(&self, chain_hash: Hash32, chain_height: u64) -> Result<(), MempoolError> {
        self.work_tx
            .send(WorkTarget {
                chain_hash,
                chain_height,
            })
            .await
            .map_err(|_| MempoolError::WorkerGone)
    }

    /// Park the worker before a chain mutation. Resolves only after the
    /// worker acknowledges, so the caller knows no pass is mid-flight.
    pub async fn suspend(&self) -> Result<(), MempoolError> {
        let (ack, acked) = oneshot::channel();
        self.suspend_tx
            .send(ack)
            .await
            .map_err(|_| MempoolError::WorkerGone)?;
        acked.await.map_err(|_| MempoolError::WorkerGone)
    }

    /// Release a suspended worker, telling it what happened meanwhile.
    pub async fn resume(&self, mode: ContinueMode) -> Result<(), MempoolError> {
        self.continue_tx
            .send(mode)
            .await
            .map_err(|_| MempoolError::WorkerGone)
    }

    /// The latest published candidate set. With `expected` set, a result
    /// computed for any other chain tip is treated as absent.
    pub fn next_transactions_to_include(
        &self,
        expected: Option<Hash32>,
    ) -> (Vec<Arc<Transaction>>, Option<Hash32>) {
        match self.result.load_full() {
            Some(result) if expected.map_or(true, |hash| hash == result.chain_hash) => (
                result.txs.iter().map(|tx| Arc::clone(&tx.tx)).collect(),
                Some(result.chain_hash),
            ),
            _ => (Vec::new(), None),
        }
    }

    pub fn contains(&self, hash: &Hash32) -> bool {
        self.registry
            .read()
            .map(|registry| registry.contains_key(hash))
            .unwrap_or(false)
    }

    pub fn get(&self, hash: &Hash32) -> Option<Arc<MempoolTx>> {
        self.registry
            .read()
            .ok()
            .and_then(|registry| registry.get(hash).cloned())
    }

    /// Number of transactions currently queued.
    pub fn pending_count(&self) -> usize {
        self.registry.read().map(|registry| registry.len()).unwrap_or(0)
    }

    /// Number of queued transactions spending from `sender`.
    pub fn pending_input_count(&self, sender: &PublicKey) -> usize {
        self.registry
            .read()
            .map(|registry| {
                registry
                    .values()
                    .filter(|tx| tx.sender.as_ref() == Some(sender))
                    .count()
            })
            .unwrap_or(0)
    }

    /// First nonce for `sender` not yet taken by a queued transaction, given
    /// the account's on-chain nonce.
    pub fn next_free_nonce(&self, sender: &PublicKey, account_nonce: u64) -> u64 {
        let Ok(registry) = self.registry.read() else {
            return account_nonce;
        };
        registry
            .values()
            .filter(|tx| tx.sender.as_ref() == Some(sender))
            .filter_map(|tx| tx.nonce)
            .map(|nonce| nonce + 1)
            .fold(account_nonce, u64::max)
    }
}
