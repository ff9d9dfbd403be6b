//! The set of collections a block mutates, committed as a unit.
//!
//! An aggregate owns the asset and registration collections plus one account
//! collection per asset, created lazily on first touch. The commit order is
//! fixed (assets, registrations, then account collections in asset-id order)
//! and fail-fast: transaction-level callers stage into the aggregate, and the
//! chain decides once per block whether the whole batch commits or rolls
//! back.

use std::collections::BTreeMap;

use umbra_store::{StoreReader, StoreWriter};
use umbra_types::PublicKey;

use crate::account::Account;
use crate::asset::{Asset, AssetId};
use crate::collection::VersionedCollection;
use crate::error::StateError;
use crate::registration::Registration;

pub const ASSETS_COLLECTION: &str = "assets";
pub const REGISTRATIONS_COLLECTION: &str = "registrations";

fn touched_assets_key(height: u64) -> Vec<u8> {
    format!("accounts:touched:{height}").into_bytes()
}

pub struct StateAggregate {
    pub assets: VersionedCollection<Asset>,
    pub registrations: VersionedCollection<Registration>,
    accounts: BTreeMap<AssetId, VersionedCollection<Account>>,
}

impl StateAggregate {
    pub fn new<R: StoreReader + ?Sized>(store: &R) -> Result<Self, StateError> {
        Ok(Self {
            assets: VersionedCollection::new(store, ASSETS_COLLECTION)?,
            registrations: VersionedCollection::new(store, REGISTRATIONS_COLLECTION)?,
            accounts: BTreeMap::new(),
        })
    }

    /// The account collection for one asset, opened on first use.
    pub fn accounts_mut<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        asset: &AssetId,
    ) -> Result<&mut VersionedCollection<Account>, StateError> {
        match self.accounts.entry(*asset) {
            std::collections::btree_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::btree_map::Entry::Vacant(entry) => {
                let name = format!("accounts:{}", hex::encode(asset.as_bytes()));
                Ok(entry.insert(VersionedCollection::new(store, &name)?))
            }
        }
    }

    pub fn get_account<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        asset: &AssetId,
        key: &PublicKey,
    ) -> Result<Option<Account>, StateError> {
        self.accounts_mut(store, asset)?.get(store, key.as_bytes())
    }

    /// Fetch the account for `key` in `asset`, staging a zero-balance account
    /// if none exists. Calling twice yields the same element.
    pub fn create_account<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        asset: &AssetId,
        key: &PublicKey,
    ) -> Result<Account, StateError> {
        let accounts = self.accounts_mut(store, asset)?;
        if let Some(existing) = accounts.get(store, key.as_bytes())? {
            return Ok(existing);
        }
        let account = Account::new();
        accounts.update(key.as_bytes(), account.clone());
        Ok(account)
    }

    pub fn update_account(&mut self, asset: &AssetId, key: &PublicKey, account: Account) {
        // The collection is necessarily open: every caller fetched the
        // account through this aggregate first.
        if let Some(accounts) = self.accounts.get_mut(asset) {
            accounts.update(key.as_bytes(), account);
        }
    }

    pub fn get_registration<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        key: &PublicKey,
    ) -> Result<Option<Registration>, StateError> {
        self.registrations.get(store, key.as_bytes())
    }

    /// Register `key` unless it already is; an existing registration is kept
    /// as-is, making re-registration a no-op.
    pub fn create_registration<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        key: &PublicKey,
        staked: bool,
        spend_public_key: Option<PublicKey>,
    ) -> Result<Registration, StateError> {
        if let Some(existing) = self.registrations.get(store, key.as_bytes())? {
            return Ok(existing);
        }
        let registration = Registration::new(staked, spend_public_key);
        self.registrations.update(key.as_bytes(), registration.clone());
        Ok(registration)
    }

    pub fn get_asset<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        id: &AssetId,
    ) -> Result<Option<Asset>, StateError> {
        self.assets.get(store, id.as_bytes())
    }

    /// Create a new asset; creating an id twice is an error.
    pub fn create_asset<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        id: &AssetId,
        asset: Asset,
    ) -> Result<(), StateError> {
        if self.assets.exists(store, id.as_bytes())? {
            return Err(StateError::DuplicateAsset(id.to_string()));
        }
        self.assets.update(id.as_bytes(), asset);
        Ok(())
    }

    pub fn update_asset(&mut self, id: &AssetId, asset: Asset) {
        self.assets.update(id.as_bytes(), asset);
    }

    /// Commit every collection's staged changes, in fixed order, failing on
    /// the first error.
    pub fn commit_changes<R: StoreReader + ?Sized>(&mut self, store: &R) -> Result<(), StateError> {
        self.assets.commit_changes(store)?;
        self.registrations.commit_changes(store)?;
        for collection in self.accounts.values_mut() {
            collection.commit_changes(store)?;
        }
        Ok(())
    }

    /// Discard staged changes in every collection. Previously committed
    /// speculative state is kept.
    pub fn rollback(&mut self) {
        self.assets.rollback();
        self.registrations.rollback();
        for collection in self.accounts.values_mut() {
            collection.rollback();
        }
    }

    /// Write per-collection transition logs for a height, plus an index of
    /// which per-asset account collections the height touched so a later
    /// reversal knows to reopen them. Returns whether any collection had
    /// staged changes.
    pub fn write_transition_logs<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
        height: u64,
    ) -> Result<bool, StateError> {
        let mut any = self.assets.write_transition_log(store, height)?;
        any |= self.registrations.write_transition_log(store, height)?;
        let mut touched: Vec<AssetId> = Vec::new();
        for (asset, collection) in self.accounts.iter_mut() {
            if collection.write_transition_log(store, height)? {
                touched.push(*asset);
                any = true;
            }
        }
        if !touched.is_empty() {
            let bytes = bincode::serialize(&touched).map_err(|e| StateError::Encode {
                collection: "accounts".into(),
                reason: e.to_string(),
            })?;
            store.put(&touched_assets_key(height), &bytes)?;
        }
        Ok(any)
    }

    /// Stage the reversal of a height from every collection's transition log.
    pub fn apply_transition_logs<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
        height: u64,
    ) -> Result<(), StateError> {
        self.assets.apply_transition_log(store, height)?;
        self.registrations.apply_transition_log(store, height)?;
        let key = touched_assets_key(height);
        if let Some(bytes) = store.get(&key)? {
            let touched: Vec<AssetId> =
                bincode::deserialize(&bytes).map_err(|e| StateError::Decode {
                    collection: "accounts".into(),
                    reason: e.to_string(),
                })?;
            for asset in &touched {
                self.accounts_mut(&*store, asset)?;
            }
            store.delete(&key)?;
        }
        for collection in self.accounts.values_mut() {
            collection.apply_transition_log(store, height)?;
        }
        Ok(())
    }

    pub fn delete_transition_logs<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
        height: u64,
    ) -> Result<(), StateError> {
        self.assets.delete_transition_log(store, height)?;
        self.registrations.delete_transition_log(store, height)?;
        for collection in self.accounts.values_mut() {
            collection.delete_transition_log(store, height)?;
        }
        store.delete(&touched_assets_key(height))?;
        Ok(())
    }

    /// Flush all committed overlays to the store.
    pub fn write_to_store<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
    ) -> Result<(), StateError> {
        self.assets.write_to_store(store)?;
        self.registrations.write_to_store(store)?;
        for collection in self.accounts.values_mut() {
            collection.write_to_store(store)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::NATIVE_ASSET_ID;
    use umbra_store::{MemoryStore, Store};

    fn key(tag: u8) -> PublicKey {
        PublicKey([tag; 33])
    }

    #[test]
    fn create_account_is_idempotent() {
        let store = MemoryStore::new();
        store
            .view(|r| {
                let mut agg = StateAggregate::new(r)?;
                let first = agg.create_account(r, &NATIVE_ASSET_ID, &key(1))?;
                let second = agg.create_account(r, &NATIVE_ASSET_ID, &key(1))?;
                assert_eq!(first, second);
                assert_eq!(first.balance, 0);
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn create_registration_keeps_existing() {
        let store = MemoryStore::new();
        store
            .view(|r| {
                let mut agg = StateAggregate::new(r)?;
                let first = agg.create_registration(r, &key(1), true, Some(key(2)))?;
                // A second registration of the same key changes nothing.
                let second = agg.create_registration(r, &key(1), false, None)?;
                assert_eq!(first, second);
                assert!(second.staked);
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn duplicate_asset_is_rejected() {
        let store = MemoryStore::new();
        store
            .view(|r| {
                let mut agg = StateAggregate::new(r)?;
                let asset = Asset {
                    version: 0,
                    index: 0,
                    can_mint: false,
                    can_burn: false,
                    decimal_separator: 7,
                    max_supply: 100,
                    supply: 0,
                    name: "Coin".into(),
                    ticker: "CN".into(),
                    update_public_key: None,
                };
                agg.create_asset(r, &NATIVE_ASSET_ID, asset.clone())?;
                assert!(matches!(
                    agg.create_asset(r, &NATIVE_ASSET_ID, asset),
                    Err(StateError::DuplicateAsset(_))
                ));
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn rollback_spans_collections_but_keeps_committed() {
        let store = MemoryStore::new();
        store
            .view(|r| {
                let mut agg = StateAggregate::new(r)?;
                agg.create_registration(r, &key(1), false, None)?;
                let mut acc = agg.create_account(r, &NATIVE_ASSET_ID, &key(1))?;
                acc.credit(50)?;
                agg.update_account(&NATIVE_ASSET_ID, &key(1), acc);
                agg.commit_changes(r)?;

                // A failed batch on top of the committed overlay.
                let mut acc = agg
                    .get_account(r, &NATIVE_ASSET_ID, &key(1))?
                    .expect("committed above");
                acc.credit(25)?;
                agg.update_account(&NATIVE_ASSET_ID, &key(1), acc);
                agg.create_registration(r, &key(2), false, None)?;
                agg.rollback();

                let acc = agg
                    .get_account(r, &NATIVE_ASSET_ID, &key(1))?
                    .expect("still committed");
                assert_eq!(acc.balance, 50);
                assert!(agg.get_registration(r, &key(2))?.is_none());
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn deleted_transition_logs_make_reversal_a_no_op() {
        let store = MemoryStore::new();
        store
            .update(|w| {
                let mut agg = StateAggregate::new(w)?;
                let mut acc = agg.create_account(w, &NATIVE_ASSET_ID, &key(1))?;
                acc.credit(50)?;
                agg.update_account(&NATIVE_ASSET_ID, &key(1), acc);
                agg.write_transition_logs(w, 1)?;
                agg.commit_changes(w)?;
                agg.write_to_store(w)?;

                // Pruned logs: reversing the height restores nothing.
                agg.delete_transition_logs(w, 1)?;
                let mut agg = StateAggregate::new(w)?;
                agg.apply_transition_logs(w, 1)?;
                agg.commit_changes(w)?;
                agg.write_to_store(w)?;

                let mut agg = StateAggregate::new(w)?;
                let acc = agg
                    .get_account(w, &NATIVE_ASSET_ID, &key(1))?
                    .expect("untouched by reversal");
                assert_eq!(acc.balance, 50);
                Ok::<_, StateError>(())
            })
            .unwrap();
    }
}
