//! Transaction formats and their ledger semantics.
//!
//! Two families exist: [`SimpleTx`] with a clear-text sender and nonce, and
//! [`ConfidentialTx`] carrying ring payloads whose proofs are verified
//! outside this crate. Both apply to a [`StateAggregate`] through
//! [`Transaction::include`]; the caller decides whether the staged result
//! commits.

pub mod confidential;
pub mod error;
pub mod simple;

pub use confidential::{ConfidentialPayload, ConfidentialTx, PayloadTransfer, RegistrationData};
pub use error::TransactionError;
pub use simple::{SimplePayload, SimpleTx};

use serde::{Deserialize, Serialize};

use umbra_state::StateAggregate;
use umbra_store::StoreReader;
use umbra_types::{blake2b_256, Hash32};

/// Store key marking a transaction as included on chain.
pub fn inclusion_key(hash: &Hash32) -> Vec<u8> {
    [b"txHash:".as_slice(), hash.as_bytes()].concat()
}

/// Store key holding a transaction's serialized bytes.
pub fn tx_key(hash: &Hash32) -> Vec<u8> {
    [b"tx:".as_slice(), hash.as_bytes()].concat()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Simple(SimpleTx),
    Confidential(ConfidentialTx),
}

impl Transaction {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::serialize(self).map_err(|e| TransactionError::Encode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        bincode::deserialize(bytes).map_err(|e| TransactionError::Decode(e.to_string()))
    }

    /// Transaction identity: Blake2b-256 of the serialized form.
    pub fn hash(&self) -> Result<Hash32, TransactionError> {
        Ok(blake2b_256(&self.to_bytes()?))
    }

    pub fn fee(&self) -> Result<u64, TransactionError> {
        match self {
            Transaction::Simple(tx) => Ok(tx.fee),
            Transaction::Confidential(tx) => tx.fee(),
        }
    }

    /// Nonce for ordering, carried only by simple transactions.
    pub fn nonce(&self) -> Option<u64> {
        match self {
            Transaction::Simple(tx) => Some(tx.nonce),
            Transaction::Confidential(_) => None,
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, Transaction::Simple(_))
    }

    /// Stage this transaction's effects into the aggregate as of `height`,
    /// the chain height of the block being built. On error the caller is
    /// expected to roll the aggregate back.
    pub fn include<R: StoreReader + ?Sized>(
        &self,
        store: &R,
        aggregate: &mut StateAggregate,
        height: u64,
    ) -> Result<(), TransactionError> {
        match self {
            Transaction::Simple(tx) => tx.include(store, aggregate, height),
            Transaction::Confidential(tx) => tx.include(store, aggregate, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_state::NATIVE_ASSET_ID;
    use umbra_types::PublicKey;

    fn sample() -> Transaction {
        Transaction::Simple(SimpleTx {
            nonce: 3,
            fee: 10,
            sender: PublicKey([1; 33]),
            payload: SimplePayload::Transfer {
                asset: NATIVE_ASSET_ID,
                recipient: PublicKey([2; 33]),
                amount: 25,
            },
            signature: vec![0; 64],
        })
    }

    #[test]
    fn round_trip_preserves_hash() {
        let tx = sample();
        let bytes = tx.to_bytes().unwrap();
        let back = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(tx, back);
        assert_eq!(tx.hash().unwrap(), back.hash().unwrap());
    }

    #[test]
    fn nonce_only_for_simple() {
        assert_eq!(sample().nonce(), Some(3));
        let conf = Transaction::Confidential(ConfidentialTx { payloads: vec![] });
        assert_eq!(conf.nonce(), None);
        assert!(!conf.is_simple());
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            Transaction::from_bytes(&[0xff; 3]),
            Err(TransactionError::Decode(_))
        ));
    }
}
