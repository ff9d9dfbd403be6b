use serde::{Deserialize, Serialize};

use umbra_state::{Asset, StateAggregate, NATIVE_ASSET_ID};
use umbra_store::StoreWriter;
use umbra_types::{amount, Hash32, PublicKey, Timestamp};

use crate::error::ChainError;
use crate::snapshot::ChainSnapshot;

/// Decimal separator of the native coin.
pub const NATIVE_DECIMALS: u8 = 7;

/// Hard cap of the native coin, in whole coins.
pub const NATIVE_MAX_SUPPLY_COINS: u64 = 42_000_000_000;

pub const NATIVE_NAME: &str = "Umbra";
pub const NATIVE_TICKER: &str = "UMB";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airdrop {
    pub key: PublicKey,
    /// Raw units credited at genesis.
    pub amount: u64,
    pub staked: bool,
    pub spend_public_key: Option<PublicKey>,
}

/// Everything needed to start a chain from nothing. Deterministic, so every
/// node derives the identical genesis state and snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisData {
    pub hash: Hash32,
    pub kernel_hash: Hash32,
    pub target: Hash32,
    pub timestamp: Timestamp,
    pub airdrops: Vec<Airdrop>,
}

impl GenesisData {
    /// The chain snapshot before any block.
    pub fn snapshot(&self, accounts_count: u64) -> ChainSnapshot {
        ChainSnapshot {
            height: 0,
            hash: self.hash,
            prev_hash: Hash32::ZERO,
            kernel_hash: self.kernel_hash,
            prev_kernel_hash: Hash32::ZERO,
            timestamp: self.timestamp,
            target: self.target,
            transactions_count: 0,
            accounts_count,
            assets_count: 1,
        }
    }
}

/// Create the native asset and airdrop balances, then persist and return the
/// height-zero snapshot.
pub fn initialize_chain<W: StoreWriter + ?Sized>(
    store: &mut W,
    genesis: &GenesisData,
) -> Result<ChainSnapshot, ChainError> {
    tracing::info!(
        airdrops = genesis.airdrops.len(),
        "initializing chain from genesis"
    );
    let mut aggregate = StateAggregate::new(store)?;
    let mut supply = 0u64;
    for airdrop in &genesis.airdrops {
        aggregate.create_registration(
            store,
            &airdrop.key,
            airdrop.staked,
            airdrop.spend_public_key,
        )?;
        let mut account = aggregate.create_account(store, &NATIVE_ASSET_ID, &airdrop.key)?;
        account.credit(airdrop.amount)?;
        aggregate.update_account(&NATIVE_ASSET_ID, &airdrop.key, account);
        supply = amount::checked_add(supply, airdrop.amount)?;
    }

    let native = Asset {
        version: 0,
        index: 0,
        can_mint: false,
        can_burn: false,
        decimal_separator: NATIVE_DECIMALS,
        max_supply: amount::to_units(NATIVE_MAX_SUPPLY_COINS, NATIVE_DECIMALS)?,
        supply,
        name: NATIVE_NAME.to_string(),
        ticker: NATIVE_TICKER.to_string(),
        update_public_key: None,
    };
    aggregate.create_asset(store, &NATIVE_ASSET_ID, native)?;

    aggregate.commit_changes(store)?;
    aggregate.write_to_store(store)?;

    let snapshot = genesis.snapshot(aggregate.registrations.count());
    snapshot.save(store, true)?;
    Ok(snapshot)
}
