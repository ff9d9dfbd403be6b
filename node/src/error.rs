use thiserror::Error;

use umbra_chain::ChainError;
use umbra_mempool::MempoolError;
use umbra_store_lmdb::LmdbError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] LmdbError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),
}
