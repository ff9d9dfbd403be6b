use thiserror::Error;

use umbra_mempool::MempoolError;
use umbra_state::StateError;
use umbra_store::StoreError;
use umbra_transactions::TransactionError;
use umbra_types::{ArithmeticError, Hash32};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("no blocks to add")]
    NoBlocks,

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("transaction {0} is already included")]
    TransactionAlreadyIncluded(Hash32),

    #[error("cannot rewind to {target}, chain is at {height}")]
    InvalidRewindTarget { target: u64, height: u64 },

    #[error("no snapshot persisted for height {0}")]
    MissingSnapshot(u64),

    #[error("no block record for height {0}")]
    MissingBlock(u64),

    #[error("codec error: {0}")]
    Codec(String),
}
