use thiserror::Error;

use umbra_state::StateError;
use umbra_store::StoreError;
use umbra_types::ArithmeticError;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("transaction is already included on chain")]
    AlreadyIncluded,

    #[error("stale nonce {got}, account is at {expected}")]
    StaleNonce { expected: u64, got: u64 },

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("unknown asset {0}")]
    UnknownAsset(String),

    #[error("asset {0} does not permit minting")]
    MintingForbidden(String),

    #[error("confidential payload does not balance against its fee")]
    UnbalancedPayload,

    #[error("transaction has no payloads")]
    EmptyTransaction,

    #[error("failed to decode transaction: {0}")]
    Decode(String),

    #[error("failed to encode transaction: {0}")]
    Encode(String),
}
