//! The single mempool worker task.
//!
//! All candidate-list mutation happens on this task; the rest of the node
//! talks to it through channels. Between inclusion attempts the worker
//! drains control signals in priority order — suspend first, then new work,
//! resume, removals, re-insertions — and accepts fresh admissions only once
//! the current scheduling pass has reached the end of the list. That keeps a
//! pass deterministic: a transaction admitted mid-pass lands at the tail and
//! is evaluated after the pass, never interleaved into it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};

use arc_swap::ArcSwapOption;
use umbra_state::StateAggregate;
use umbra_store::Store;
use umbra_transactions::inclusion_key;
use umbra_types::Hash32;

use crate::error::MempoolError;
use crate::tx::{sort_candidates, MempoolResult, MempoolTx};

/// Default cap on the accumulated size of scheduled transactions.
pub const DEFAULT_BLOCK_MAX_SIZE: u64 = 1 << 20;

#[derive(Debug, Clone)]
pub struct MempoolConfig {
    pub block_max_size: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            block_max_size: DEFAULT_BLOCK_MAX_SIZE,
        }
    }
}

/// How a suspended worker should treat its speculative state on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueMode {
    /// The chain mutation failed: discard speculative state and wait for
    /// new work.
    Error,
    /// The chain advanced: discard the old work target and wait for the new
    /// one.
    NoError,
    /// The chain state changed under the same tip: keep the work target but
    /// redo the pass from scratch.
    NoErrorReset,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkTarget {
    pub chain_hash: Hash32,
    pub chain_height: u64,
}

pub(crate) struct AddRequest {
    pub tx: Arc<MempoolTx>,
    /// Tip height the submitter validated against.
    pub chain_height: u64,
    pub reply: oneshot::Sender<Result<bool, MempoolError>>,
}

pub(crate) struct RemoveRequest {
    pub hashes: Vec<Hash32>,
    pub reply: oneshot::Sender<bool>,
}

pub(crate) struct InsertRequest {
    pub txs: Vec<Arc<MempoolTx>>,
    pub reply: oneshot::Sender<bool>,
}

enum Signal {
    Suspend(oneshot::Sender<()>),
    NewWork(WorkTarget),
    Continue(ContinueMode),
    Remove(RemoveRequest),
    Insert(InsertRequest),
    Add(AddRequest),
    Closed,
}

enum Outcome {
    Included,
    SizeExceeded,
    Rejected(MempoolError),
}

pub struct MempoolWorker<S: Store> {
    store: Arc<S>,
    config: MempoolConfig,
    registry: Arc<RwLock<HashMap<Hash32, Arc<MempoolTx>>>>,
    result: Arc<ArcSwapOption<MempoolResult>>,

    suspend_rx: mpsc::Receiver<oneshot::Sender<()>>,
    work_rx: mpsc::Receiver<WorkTarget>,
    continue_rx: mpsc::Receiver<ContinueMode>,
    remove_rx: mpsc::Receiver<RemoveRequest>,
    insert_rx: mpsc::Receiver<InsertRequest>,
    add_rx: mpsc::Receiver<AddRequest>,

    suspended: bool,
    work: Option<WorkTarget>,
    list: Vec<Arc<MempoolTx>>,
    list_index: usize,
    included: Vec<Arc<MempoolTx>>,
    included_size: u64,
    /// Speculative state carried across inclusion attempts of one pass.
    aggregate: Option<StateAggregate>,
}

impl<S: Store> MempoolWorker<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<S>,
        config: MempoolConfig,
        registry: Arc<RwLock<HashMap<Hash32, Arc<MempoolTx>>>>,
        result: Arc<ArcSwapOption<MempoolResult>>,
        suspend_rx: mpsc::Receiver<oneshot::Sender<()>>,
        work_rx: mpsc::Receiver<WorkTarget>,
        continue_rx: mpsc::Receiver<ContinueMode>,
        remove_rx: mpsc::Receiver<RemoveRequest>,
        insert_rx: mpsc::Receiver<InsertRequest>,
        add_rx: mpsc::Receiver<AddRequest>,
    ) -> Self {
        Self {
            store,
            config,
            registry,
            result,
            suspend_rx,
            work_rx,
            continue_rx,
            remove_rx,
            insert_rx,
            add_rx,
            suspended: false,
            work: None,
            list: Vec::new(),
            list_index: 0,
            included: Vec::new(),
            included_size: 0,
            aggregate: None,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!("mempool worker started");
        loop {
            match self.next_signal().await {
                Signal::Closed => break,
                Signal::Suspend(ack) => {
                    self.suspended = true;
                    let _ = ack.send(());
                }
                Signal::NewWork(work) => self.reset_work(work),
                Signal::Continue(mode) => self.resume(mode),
                Signal::Remove(req) => {
                    let changed = self.remove(&req.hashes);
                    let _ = req.reply.send(changed);
                }
                Signal::Insert(req) => {
                    let inserted = self.insert(req.txs);
                    let _ = req.reply.send(inserted);
                }
                Signal::Add(req) => self.handle_add(req),
            }
        }
        tracing::debug!("mempool worker stopped");
    }

    /// Drain control channels in priority order; when none are ready, make
    /// one inclusion attempt if a pass is in progress, otherwise park.
    async fn next_signal(&mut self) -> Signal {
        loop {
            if self.suspended {
                // Parked for a chain mutation: only a resume moves us.
                return match self.continue_rx.recv().await {
                    Some(mode) => Signal::Continue(mode),
                    None => Signal::Closed,
                };
            }
            if let Ok(ack) = self.suspend_rx.try_recv() {
                return Signal::Suspend(ack);
            }
            if let Ok(work) = self.work_rx.try_recv() {
                return Signal::NewWork(work);
            }
            if let Ok(mode) = self.continue_rx.try_recv() {
                return Signal::Continue(mode);
            }
            if let Ok(req) = self.remove_rx.try_recv() {
                return Signal::Remove(req);
            }
            if let Ok(req) = self.insert_rx.try_recv() {
                return Signal::Insert(req);
            }
            if self.accepting_adds() {
                if let Ok(req) = self.add_rx.try_recv() {
                    return Signal::Add(req);
                }
            }
            if self.pass_in_progress() {
                self.advance();
                continue;
            }
            return self.wait_signal().await;
        }
    }

    async fn wait_signal(&mut self) -> Signal {
        let accepting_adds = self.accepting_adds();
        let Self {
            suspend_rx,
            work_rx,
            continue_rx,
            remove_rx,
            insert_rx,
            add_rx,
            ..
        } = self;
        tokio::select! {
            biased;
            ack = suspend_rx.recv() => match ack {
                Some(ack) => Signal::Suspend(ack),
                None => Signal::Closed,
            },
            work = work_rx.recv() => match work {
                Some(work) => Signal::NewWork(work),
                None => Signal::Closed,
            },
            mode = continue_rx.recv() => match mode {
                Some(mode) => Signal::Continue(mode),
                None => Signal::Closed,
            },
            req = remove_rx.recv() => match req {
                Some(req) => Signal::Remove(req),
                None => Signal::Closed,
            },
            req = insert_rx.recv() => match req {
                Some(req) => Signal::Insert(req),
                None => Signal::Closed,
            },
            req = add_rx.recv(), if accepting_adds => match req {
                Some(req) => Signal::Add(req),
                None => Signal::Closed,
            },
        }
    }

    fn pass_in_progress(&self) -> bool {
        !self.suspended && self.work.is_some() && self.list_index < self.list.len()
    }

    /// Fresh admissions are taken only between passes, never mid-pass.
    fn accepting_adds(&self) -> bool {
        !self.suspended && self.work.is_some() && self.list_index >= self.list.len()
    }

    fn reset_work(&mut self, work: WorkTarget) {
        tracing::debug!(height = work.chain_height, hash = %work.chain_hash, "new mempool work");
        self.work = Some(work);
        self.list_index = 0;
        self.included.clear();
        self.included_size = 0;
        self.aggregate = None;
        if self.list.len() > 1 {
            sort_candidates(&mut self.list);
        }
        self.publish();
    }

    fn resume(&mut self, mode: ContinueMode) {
        self.suspended = false;
        match mode {
            ContinueMode::Error => {
                self.work = None;
                self.aggregate = None;
                self.included.clear();
                self.included_size = 0;
            }
            ContinueMode::NoError => {
                self.work = None;
            }
            ContinueMode::NoErrorReset => {
                self.aggregate = None;
                self.list_index = 0;
                self.included.clear();
                self.included_size = 0;
                self.publish();
            }
        }
    }

    fn remove(&mut self, hashes: &[Hash32]) -> bool {
        let targets: HashSet<Hash32> = hashes.iter().copied().collect();
        let before = self.list.len();
        let mut new_index = self.list_index;
        let mut kept = Vec::with_capacity(before);
        for (position, tx) in self.list.drain(..).enumerate() {
            if targets.contains(&tx.hash) {
                if position < new_index {
                    new_index -= 1;
                }
            } else {
                kept.push(tx);
            }
        }
        self.list = kept;
        self.list_index = new_index;
        let changed = self.list.len() != before;
        if changed {
            if let Ok(mut registry) = self.registry.write() {
                registry.retain(|hash, _| !targets.contains(hash));
            }
            let kept_included: Vec<Arc<MempoolTx>> = self
                .included
                .iter()
                .filter(|tx| !targets.contains(&tx.hash))
                .cloned()
                .collect();
            if kept_included.len() != self.included.len() {
                self.included = kept_included;
                self.included_size = self.included.iter().map(|tx| tx.size).sum();
                self.publish();
            }
        }
        changed
    }

    fn insert(&mut self, txs: Vec<Arc<MempoolTx>>) -> bool {
        let mut inserted = false;
        for tx in txs {
            let known = self
                .registry
                .read()
                .map(|registry| registry.contains_key(&tx.hash))
                .unwrap_or(true);
            if known {
                continue;
            }
            if let Ok(mut registry) = self.registry.write() {
                registry.insert(tx.hash, Arc::clone(&tx));
            }
            self.list.push(tx);
            inserted = true;
        }
        inserted
    }

    fn handle_add(&mut self, req: AddRequest) {
        let known = self
            .registry
            .read()
            .map(|registry| registry.contains_key(&req.tx.hash))
            .unwrap_or(true);
        if known {
            let _ = req.reply.send(Ok(false));
            return;
        }
        if let Some(work) = &self.work {
            if req.chain_height != work.chain_height {
                tracing::trace!(
                    submitted = req.chain_height,
                    target = work.chain_height,
                    "admission submitted against a different tip"
                );
            }
        }
        match self.try_include(&req.tx) {
            Ok(Outcome::Included) => {
                self.included.push(Arc::clone(&req.tx));
                self.included_size += req.tx.size;
                self.admit(Arc::clone(&req.tx));
                self.publish();
                let _ = req.reply.send(Ok(true));
            }
            Ok(Outcome::SizeExceeded) => {
                // Valid but does not fit the current block; keep it queued.
                self.admit(Arc::clone(&req.tx));
                let _ = req.reply.send(Ok(true));
            }
            Ok(Outcome::Rejected(overlay_err)) => {
                // The speculative overlay refused it, but a transaction can
                // be unschedulable in this pass's order yet valid against
                // the chain itself: a lower nonce than one already chosen
                // collides with the overlay's bumped account. Those are
                // queued; the next pass re-sorts and picks them up first.
                match self.check_against_chain(&req.tx) {
                    Ok(()) => {
                        tracing::trace!(
                            hash = %req.tx.hash,
                            error = %overlay_err,
                            "unschedulable this pass, queued for the next"
                        );
                        self.admit(Arc::clone(&req.tx));
                        let _ = req.reply.send(Ok(true));
                    }
                    Err(err) => {
                        let _ = req.reply.send(Err(err));
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "store failure while admitting transaction");
                self.aggregate = None;
                let _ = req.reply.send(Err(err));
            }
        }
    }

    fn admit(&mut self, tx: Arc<MempoolTx>) {
        if let Ok(mut registry) = self.registry.write() {
            registry.insert(tx.hash, Arc::clone(&tx));
        }
        self.list.push(tx);
        self.list_index = self.list.len();
    }

    /// One inclusion attempt against the transaction at the cursor.
    fn advance(&mut self) {
        let tx = Arc::clone(&self.list[self.list_index]);
        self.list_index += 1;
        match self.try_include(&tx) {
            Ok(Outcome::Included) => {
                self.included.push(tx);
                self.included_size = self.included.iter().map(|t| t.size).sum();
                self.publish();
            }
            Ok(Outcome::SizeExceeded) => {
                tracing::trace!(hash = %tx.hash, "transaction does not fit the current block");
            }
            Ok(Outcome::Rejected(err)) => {
                tracing::debug!(hash = %tx.hash, error = %err, "dropping invalid transaction");
                self.list_index -= 1;
                self.list.remove(self.list_index);
                if let Ok(mut registry) = self.registry.write() {
                    registry.remove(&tx.hash);
                }
            }
            Err(err) => {
                // Backend trouble: restart speculation next pass, keep the
                // transaction.
                tracing::warn!(hash = %tx.hash, error = %err, "inclusion attempt failed");
                self.aggregate = None;
            }
        }
    }

    /// Validate `tx` against chain state plus the pass's speculative
    /// overlay. On success the staged changes are committed into the
    /// overlay; on a verdict against the transaction they are rolled back.
    fn try_include(&mut self, tx: &Arc<MempoolTx>) -> Result<Outcome, MempoolError> {
        let store = Arc::clone(&self.store);
        let mut aggregate = self.aggregate.take();
        let budget = self.config.block_max_size;
        let used = self.included_size;
        // Inclusion attempts only run with a work target in place.
        let height = self.work.as_ref().map_or(0, |work| work.chain_height);
        let candidate = Arc::clone(tx);

        let outcome = store.view(|reader| {
            let mut agg = match aggregate.take() {
                Some(agg) => agg,
                None => StateAggregate::new(reader)?,
            };
            let outcome = if reader.exists(&inclusion_key(&candidate.hash))? {
                Outcome::Rejected(MempoolError::AlreadyOnChain)
            } else if let Err(err) = candidate.tx.include(reader, &mut agg, height) {
                agg.rollback();
                Outcome::Rejected(err.into())
            } else if used + candidate.size >= budget {
                // The scheduled total must stay strictly below the budget.
                agg.rollback();
                Outcome::SizeExceeded
            } else {
                agg.commit_changes(reader)?;
                Outcome::Included
            };
            aggregate = Some(agg);
            Ok::<_, MempoolError>(outcome)
        });
        self.aggregate = aggregate;
        outcome
    }

    /// Validate `tx` against committed chain state alone, ignoring the
    /// pass's speculative overlay. Nothing is staged; the throwaway
    /// aggregate is rolled back either way.
    fn check_against_chain(&self, tx: &Arc<MempoolTx>) -> Result<(), MempoolError> {
        let store = Arc::clone(&self.store);
        let height = self.work.as_ref().map_or(0, |work| work.chain_height);
        let candidate = Arc::clone(tx);
        store.view(|reader| {
            if reader.exists(&inclusion_key(&candidate.hash))? {
                return Err(MempoolError::AlreadyOnChain);
            }
            let mut agg = StateAggregate::new(reader)?;
            let verdict = candidate.tx.include(reader, &mut agg, height);
            agg.rollback();
            verdict.map_err(MempoolError::from)
        })
    }

    fn publish(&self) {
        let Some(work) = &self.work else {
            return;
        };
        self.result.store(Some(Arc::new(MempoolResult {
            chain_hash: work.chain_hash,
            chain_height: work.chain_height,
            txs: self.included.clone(),
            total_size: self.included_size,
        })));
    }
}
