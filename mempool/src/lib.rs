//! Fee-ordered transaction scheduling against speculative chain state.
//!
//! A single worker task owns the candidate list. It validates candidates in
//! fee order against the current tip plus an in-memory speculative overlay,
//! publishes the chosen set lock-free, and cooperates with chain mutations
//! through an acknowledged suspend/resume handshake.

pub mod error;
pub mod mempool;
pub mod tx;
pub mod worker;

pub use error::MempoolError;
pub use mempool::Mempool;
pub use tx::{sort_candidates, MempoolResult, MempoolTx};
pub use worker::{ContinueMode, MempoolConfig, MempoolWorker, DEFAULT_BLOCK_MAX_SIZE};
