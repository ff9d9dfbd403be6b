use serde::{Deserialize, Serialize};

use umbra_state::{AssetId, StateAggregate};
use umbra_store::StoreReader;
use umbra_types::PublicKey;

use crate::error::TransactionError;
use crate::simple::debit_checked;

/// Multi-payload transaction. Each payload moves value within one asset
/// among a ring of accounts; the zero-knowledge proof bytes are opaque here
/// and verified before the transaction reaches the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialTx {
    pub payloads: Vec<ConfidentialPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialPayload {
    pub asset: AssetId,
    pub fee: u64,
    /// Opaque range/ownership proof covering this payload's transfers.
    pub proof: Vec<u8>,
    pub transfers: Vec<PayloadTransfer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadTransfer {
    pub key: PublicKey,
    /// First-use registration piggybacked on the transfer, if any.
    pub registration: Option<RegistrationData>,
    /// Balance change for this key; negative for spenders.
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationData {
    pub staked: bool,
    pub spend_public_key: Option<PublicKey>,
}

impl ConfidentialTx {
    /// Total fee across payloads.
    pub fn fee(&self) -> Result<u64, TransactionError> {
        let mut total = 0u64;
        for payload in &self.payloads {
            total = umbra_types::amount::checked_add(total, payload.fee)?;
        }
        Ok(total)
    }

    /// Apply all payloads to the aggregate's staged state.
    ///
    /// A payload must conserve value: its deltas sum to exactly minus its
    /// fee, so the fee is burned out of the ring rather than drawn from a
    /// named account.
    pub fn include<R: StoreReader + ?Sized>(
        &self,
        store: &R,
        aggregate: &mut StateAggregate,
        _height: u64,
    ) -> Result<(), TransactionError> {
        if self.payloads.is_empty() {
            return Err(TransactionError::EmptyTransaction);
        }
        for payload in &self.payloads {
            payload.check_balance()?;
            for transfer in &payload.transfers {
                if let Some(reg) = &transfer.registration {
                    aggregate.create_registration(
                        store,
                        &transfer.key,
                        reg.staked,
                        reg.spend_public_key,
                    )?;
                }
                let mut account = aggregate.create_account(store, &payload.asset, &transfer.key)?;
                if transfer.delta >= 0 {
                    account.credit(transfer.delta as u64)?;
                } else {
                    debit_checked(&mut account, transfer.delta.unsigned_abs())?;
                }
                aggregate.update_account(&payload.asset, &transfer.key, account);
            }
        }
        Ok(())
    }
}

impl ConfidentialPayload {
    fn check_balance(&self) -> Result<(), TransactionError> {
        let sum: i128 = self.transfers.iter().map(|t| t.delta as i128).sum();
        if sum != -(self.fee as i128) {
            return Err(TransactionError::UnbalancedPayload);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_state::{StateError, NATIVE_ASSET_ID};
    use umbra_store::{MemoryStore, Store};

    fn key(tag: u8) -> PublicKey {
        PublicKey([tag; 33])
    }

    fn ring_tx(fee: u64, deltas: &[(u8, i64)]) -> ConfidentialTx {
        ConfidentialTx {
            payloads: vec![ConfidentialPayload {
                asset: NATIVE_ASSET_ID,
                fee,
                proof: vec![0xaa; 32],
                transfers: deltas
                    .iter()
                    .map(|&(tag, delta)| PayloadTransfer {
                        key: key(tag),
                        registration: Some(RegistrationData {
                            staked: false,
                            spend_public_key: None,
                        }),
                        delta,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn ring_moves_value_and_burns_fee() {
        let store = MemoryStore::new();
        let mut agg = store.view(|r| StateAggregate::new(r)).unwrap();
        store
            .view(|r| {
                let mut acc = agg.create_account(r, &NATIVE_ASSET_ID, &key(1))?;
                acc.credit(500)?;
                agg.update_account(&NATIVE_ASSET_ID, &key(1), acc);
                agg.commit_changes(r)?;
                Ok::<_, StateError>(())
            })
            .unwrap();
        store
            .view(|r| {
                // key(1) spends 105: 100 to key(2), 5 burned as fee.
                ring_tx(5, &[(1, -105), (2, 100)]).include(r, &mut agg, 1)?;
                assert_eq!(agg.get_account(r, &NATIVE_ASSET_ID, &key(1))?.unwrap().balance, 395);
                assert_eq!(agg.get_account(r, &NATIVE_ASSET_ID, &key(2))?.unwrap().balance, 100);
                assert!(agg.get_registration(r, &key(2))?.is_some());
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }

    #[test]
    fn unbalanced_payload_is_rejected() {
        let store = MemoryStore::new();
        let mut agg = store.view(|r| StateAggregate::new(r)).unwrap();
        store
            .view(|r| {
                assert!(matches!(
                    ring_tx(5, &[(1, -100), (2, 100)]).include(r, &mut agg, 1),
                    Err(TransactionError::UnbalancedPayload)
                ));
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }

    #[test]
    fn overdraw_in_a_ring_is_rejected() {
        let store = MemoryStore::new();
        let mut agg = store.view(|r| StateAggregate::new(r)).unwrap();
        store
            .view(|r| {
                assert!(matches!(
                    ring_tx(0, &[(1, -10), (2, 10)]).include(r, &mut agg, 1),
                    Err(TransactionError::InsufficientFunds { .. })
                ));
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }

    #[test]
    fn fee_sums_across_payloads() {
        let mut tx = ring_tx(5, &[(1, -5)]);
        tx.payloads.push(tx.payloads[0].clone());
        assert_eq!(tx.fee().unwrap(), 10);
    }
}
