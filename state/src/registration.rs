use serde::{Deserialize, Serialize};

use umbra_types::PublicKey;

use crate::element::CollectionElement;
use crate::error::StateError;

pub const REGISTRATION_VERSION: u64 = 0;

/// Records that a public key has joined the ledger, and whether it carries a
/// separate spend key for staking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub version: u64,
    pub index: u64,
    pub staked: bool,
    pub spend_public_key: Option<PublicKey>,
}

impl Registration {
    pub fn new(staked: bool, spend_public_key: Option<PublicKey>) -> Self {
        Self {
            version: REGISTRATION_VERSION,
            index: 0,
            staked,
            spend_public_key,
        }
    }
}

impl CollectionElement for Registration {
    const DELETABLE: bool = false;

    fn index(&self) -> u64 {
        self.index
    }

    fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    fn validate(&self) -> Result<(), StateError> {
        if self.version != REGISTRATION_VERSION {
            return Err(StateError::Validation {
                collection: "registrations".into(),
                reason: format!("unknown registration version {}", self.version),
            });
        }
        if self.spend_public_key.is_some() && !self.staked {
            return Err(StateError::Validation {
                collection: "registrations".into(),
                reason: "spend key requires a staked registration".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_key_requires_staking() {
        let reg = Registration::new(false, Some(PublicKey([9; 33])));
        assert!(reg.validate().is_err());
        assert!(Registration::new(true, Some(PublicKey([9; 33]))).validate().is_ok());
        assert!(Registration::new(false, None).validate().is_ok());
    }
}
