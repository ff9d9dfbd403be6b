use serde::{Deserialize, Serialize};

use umbra_types::amount;

use crate::element::CollectionElement;
use crate::error::StateError;

pub const ACCOUNT_VERSION: u64 = 0;

/// Per-asset balance record. Accounts live in one collection per asset, keyed
/// by the owner's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub version: u64,
    pub index: u64,
    pub nonce: u64,
    pub balance: u64,
}

impl Account {
    pub fn new() -> Self {
        Self {
            version: ACCOUNT_VERSION,
            index: 0,
            nonce: 0,
            balance: 0,
        }
    }

    pub fn credit(&mut self, amount_units: u64) -> Result<(), StateError> {
        self.balance = amount::checked_add(self.balance, amount_units)?;
        Ok(())
    }

    pub fn debit(&mut self, amount_units: u64) -> Result<(), StateError> {
        self.balance = amount::checked_sub(self.balance, amount_units)?;
        Ok(())
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionElement for Account {
    const DELETABLE: bool = false;

    fn index(&self) -> u64 {
        self.index
    }

    fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    fn validate(&self) -> Result<(), StateError> {
        if self.version != ACCOUNT_VERSION {
            return Err(StateError::Validation {
                collection: "accounts".into(),
                reason: format!("unknown account version {}", self.version),
            });
        }
        Ok(())
    }
}
