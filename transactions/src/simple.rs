use serde::{Deserialize, Serialize};

use umbra_state::{AssetId, StateAggregate, NATIVE_ASSET_ID};
use umbra_store::StoreReader;
use umbra_types::{amount, PublicKey};

use crate::error::TransactionError;

/// Single-sender, nonce-bearing transaction. The sender and amounts are in
/// the clear; the signature is opaque bytes verified outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTx {
    pub nonce: u64,
    pub fee: u64,
    pub sender: PublicKey,
    pub payload: SimplePayload,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimplePayload {
    Transfer {
        asset: AssetId,
        recipient: PublicKey,
        amount: u64,
    },
    /// Mint new supply of an asset that permits it, crediting `recipient`.
    SupplyIncrease {
        asset: AssetId,
        recipient: PublicKey,
        amount: u64,
    },
}

impl SimpleTx {
    /// Apply this transaction to the aggregate's staged state.
    ///
    /// Nonces are replay protection, not strict sequencing: a nonce below the
    /// account's current value is rejected, anything at or above it is
    /// accepted and bumps the account past it. Gaps are allowed so that
    /// fee-ordered inclusion never deadlocks on a missing intermediate nonce.
    pub fn include<R: StoreReader + ?Sized>(
        &self,
        store: &R,
        aggregate: &mut StateAggregate,
        _height: u64,
    ) -> Result<(), TransactionError> {
        let mut sender = aggregate.create_account(store, &NATIVE_ASSET_ID, &self.sender)?;
        if self.nonce < sender.nonce {
            return Err(TransactionError::StaleNonce {
                expected: sender.nonce,
                got: self.nonce,
            });
        }
        sender.nonce = amount::checked_add(self.nonce, 1)?;
        debit_checked(&mut sender, self.fee)?;
        aggregate.update_account(&NATIVE_ASSET_ID, &self.sender, sender);

        match &self.payload {
            SimplePayload::Transfer { asset, recipient, amount } => {
                // Re-read through the aggregate so a native-asset transfer
                // sees the fee already taken.
                let mut from = aggregate.create_account(store, asset, &self.sender)?;
                debit_checked(&mut from, *amount)?;
                aggregate.update_account(asset, &self.sender, from);

                aggregate.create_registration(store, recipient, false, None)?;
                let mut to = aggregate.create_account(store, asset, recipient)?;
                to.credit(*amount)?;
                aggregate.update_account(asset, recipient, to);
            }
            SimplePayload::SupplyIncrease { asset, recipient, amount } => {
                let mut descriptor = aggregate
                    .get_asset(store, asset)?
                    .ok_or_else(|| TransactionError::UnknownAsset(asset.to_string()))?;
                if !descriptor.can_mint {
                    return Err(TransactionError::MintingForbidden(asset.to_string()));
                }
                descriptor.add_supply(asset, *amount)?;
                aggregate.update_asset(asset, descriptor);

                aggregate.create_registration(store, recipient, false, None)?;
                let mut to = aggregate.create_account(store, asset, recipient)?;
                to.credit(*amount)?;
                aggregate.update_account(asset, recipient, to);
            }
        }
        Ok(())
    }
}

pub(crate) fn debit_checked(
    account: &mut umbra_state::Account,
    amount: u64,
) -> Result<(), TransactionError> {
    if account.balance < amount {
        return Err(TransactionError::InsufficientFunds {
            balance: account.balance,
            required: amount,
        });
    }
    account.debit(amount)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_state::StateError;
    use umbra_store::{MemoryStore, Store};

    fn key(tag: u8) -> PublicKey {
        PublicKey([tag; 33])
    }

    fn new_aggregate(store: &MemoryStore) -> StateAggregate {
        store.view(|r| StateAggregate::new(r)).unwrap()
    }

    fn seed(aggregate: &mut StateAggregate, store: &MemoryStore, owner: &PublicKey, balance: u64) {
        store
            .view(|r| {
                aggregate.create_registration(r, owner, false, None)?;
                let mut acc = aggregate.create_account(r, &NATIVE_ASSET_ID, owner)?;
                acc.credit(balance)?;
                aggregate.update_account(&NATIVE_ASSET_ID, owner, acc);
                aggregate.commit_changes(r)?;
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    fn transfer(sender: PublicKey, recipient: PublicKey, amount: u64, fee: u64, nonce: u64) -> SimpleTx {
        SimpleTx {
            nonce,
            fee,
            sender,
            payload: SimplePayload::Transfer {
                asset: NATIVE_ASSET_ID,
                recipient,
                amount,
            },
            signature: vec![0; 64],
        }
    }

    #[test]
    fn transfer_moves_funds_and_fee() {
        let store = MemoryStore::new();
        let mut agg = new_aggregate(&store);
        seed(&mut agg, &store, &key(1), 1_000);
        store
            .view(|r| {
                transfer(key(1), key(2), 700, 10, 0).include(r, &mut agg, 1)?;
                let sender = agg.get_account(r, &NATIVE_ASSET_ID, &key(1))?.unwrap();
                let recipient = agg.get_account(r, &NATIVE_ASSET_ID, &key(2))?.unwrap();
                assert_eq!(sender.balance, 290);
                assert_eq!(sender.nonce, 1);
                assert_eq!(recipient.balance, 700);
                // The recipient got registered on the way.
                assert!(agg.get_registration(r, &key(2))?.is_some());
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }

    #[test]
    fn stale_nonce_is_rejected_and_gaps_are_not() {
        let store = MemoryStore::new();
        let mut agg = new_aggregate(&store);
        seed(&mut agg, &store, &key(1), 1_000);
        store
            .view(|r| {
                transfer(key(1), key(2), 10, 1, 5).include(r, &mut agg, 1)?;
                let sender = agg.get_account(r, &NATIVE_ASSET_ID, &key(1))?.unwrap();
                assert_eq!(sender.nonce, 6);
                assert!(matches!(
                    transfer(key(1), key(2), 10, 1, 3).include(r, &mut agg, 1),
                    Err(TransactionError::StaleNonce { expected: 6, got: 3 })
                ));
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }

    #[test]
    fn nonce_at_the_ceiling_cannot_advance() {
        let store = MemoryStore::new();
        let mut agg = new_aggregate(&store);
        seed(&mut agg, &store, &key(1), 1_000);
        store
            .view(|r| {
                // The account could never be bumped past u64::MAX; the
                // transaction is refused instead of wrapping.
                assert!(matches!(
                    transfer(key(1), key(2), 10, 1, u64::MAX).include(r, &mut agg, 1),
                    Err(TransactionError::Arithmetic(_))
                ));
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }

    #[test]
    fn insufficient_funds_covers_fee_plus_amount() {
        let store = MemoryStore::new();
        let mut agg = new_aggregate(&store);
        seed(&mut agg, &store, &key(1), 100);
        store
            .view(|r| {
                assert!(matches!(
                    transfer(key(1), key(2), 95, 10, 0).include(r, &mut agg, 1),
                    Err(TransactionError::InsufficientFunds { .. })
                ));
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }

    #[test]
    fn minting_requires_policy() {
        let store = MemoryStore::new();
        let asset_id = AssetId::new([9; 32]);
        let mut agg = new_aggregate(&store);
        store
            .view(|r| {
                agg.create_asset(
                    r,
                    &asset_id,
                    umbra_state::Asset {
                        version: 0,
                        index: 0,
                        can_mint: false,
                        can_burn: false,
                        decimal_separator: 0,
                        max_supply: 1_000,
                        supply: 0,
                        name: "Fixed".into(),
                        ticker: "FIX".into(),
                        update_public_key: None,
                    },
                )?;
                agg.commit_changes(r)?;
                Ok::<_, StateError>(())
            })
            .unwrap();
        seed(&mut agg, &store, &key(1), 100);
        store
            .view(|r| {
                let tx = SimpleTx {
                    nonce: 0,
                    fee: 1,
                    sender: key(1),
                    payload: SimplePayload::SupplyIncrease {
                        asset: asset_id,
                        recipient: key(2),
                        amount: 10,
                    },
                    signature: vec![],
                };
                assert!(matches!(
                    tx.include(r, &mut agg, 1),
                    Err(TransactionError::MintingForbidden(_))
                ));
                Ok::<_, TransactionError>(())
            })
            .unwrap();
    }
}
