use thiserror::Error;

use umbra_store::StoreError;
use umbra_types::ArithmeticError;

/// Errors produced while reading, staging, or committing ledger state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("failed to decode element in `{collection}`: {reason}")]
    Decode { collection: String, reason: String },

    #[error("failed to encode element in `{collection}`: {reason}")]
    Encode { collection: String, reason: String },

    #[error("elements of `{0}` cannot be deleted")]
    NotDeletable(String),

    #[error("invalid element in `{collection}`: {reason}")]
    Validation { collection: String, reason: String },

    #[error("asset {0} already exists")]
    DuplicateAsset(String),

    #[error("asset {0} not found")]
    AssetNotFound(String),

    #[error("supply of asset {asset} would exceed its maximum of {max_supply}")]
    SupplyExceeded { asset: String, max_supply: u64 },
}
