use serde::{Deserialize, Serialize};

use umbra_types::{amount, Hash32, PublicKey};

use crate::element::CollectionElement;
use crate::error::StateError;

pub const ASSET_VERSION: u64 = 0;

/// Widest decimal separator an asset may declare.
pub const MAX_DECIMAL_SEPARATOR: u8 = 10;

/// Assets are keyed by a 32-byte identifier; the native coin uses the
/// all-zero id.
pub type AssetId = Hash32;

pub const NATIVE_ASSET_ID: AssetId = Hash32::ZERO;

/// On-ledger asset descriptor: supply bookkeeping plus mint/burn policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub version: u64,
    pub index: u64,
    pub can_mint: bool,
    pub can_burn: bool,
    pub decimal_separator: u8,
    pub max_supply: u64,
    pub supply: u64,
    pub name: String,
    pub ticker: String,
    /// Key allowed to change the asset's policy, if any.
    pub update_public_key: Option<PublicKey>,
}

impl Asset {
    /// Raise the circulating supply, capped at `max_supply`. Mint policy is
    /// enforced by the caller; the block reward path mints regardless.
    pub fn add_supply(&mut self, asset_id: &AssetId, amount_units: u64) -> Result<(), StateError> {
        let next = amount::checked_add(self.supply, amount_units)?;
        if next > self.max_supply {
            return Err(StateError::SupplyExceeded {
                asset: asset_id.to_string(),
                max_supply: self.max_supply,
            });
        }
        self.supply = next;
        Ok(())
    }
}

impl CollectionElement for Asset {
    const DELETABLE: bool = false;

    fn index(&self) -> u64 {
        self.index
    }

    fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    fn validate(&self) -> Result<(), StateError> {
        let fail = |reason: String| StateError::Validation {
            collection: "assets".into(),
            reason,
        };
        if self.version != ASSET_VERSION {
            return Err(fail(format!("unknown asset version {}", self.version)));
        }
        if self.decimal_separator > MAX_DECIMAL_SEPARATOR {
            return Err(fail(format!(
                "decimal separator {} exceeds {}",
                self.decimal_separator, MAX_DECIMAL_SEPARATOR
            )));
        }
        if self.supply > self.max_supply {
            return Err(fail("supply exceeds max supply".into()));
        }
        if !(3..=20).contains(&self.name.len()) {
            return Err(fail("asset name must be 3..=20 bytes".into()));
        }
        if !(2..=10).contains(&self.ticker.len()) {
            return Err(fail("asset ticker must be 2..=10 bytes".into()));
        }
        if !self.ticker.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(fail("asset ticker must be uppercase ascii".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Asset {
        Asset {
            version: ASSET_VERSION,
            index: 0,
            can_mint: true,
            can_burn: false,
            decimal_separator: 7,
            max_supply: 1_000,
            supply: 0,
            name: "Test Asset".into(),
            ticker: "TST".into(),
            update_public_key: None,
        }
    }

    #[test]
    fn supply_is_capped() {
        let mut asset = sample();
        let id = NATIVE_ASSET_ID;
        asset.add_supply(&id, 900).unwrap();
        assert!(asset.add_supply(&id, 101).is_err());
        asset.add_supply(&id, 100).unwrap();
        assert_eq!(asset.supply, 1_000);
    }

    #[test]
    fn validate_checks_ticker_and_separator() {
        let mut asset = sample();
        asset.ticker = "bad".into();
        assert!(asset.validate().is_err());

        let mut asset = sample();
        asset.decimal_separator = MAX_DECIMAL_SEPARATOR + 1;
        assert!(asset.validate().is_err());

        assert!(sample().validate().is_ok());
    }
}
