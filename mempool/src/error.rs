use thiserror::Error;

use umbra_state::StateError;
use umbra_store::StoreError;
use umbra_transactions::TransactionError;

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("transaction is already on chain")]
    AlreadyOnChain,

    #[error("fee {fee} too low for a {size} byte transaction")]
    FeeTooLow { fee: u64, size: u64 },

    #[error("mempool worker has stopped")]
    WorkerGone,
}
