//! Block application, removal and rewind over versioned chain state.

pub mod block;
pub mod chain;
pub mod error;
pub mod genesis;
pub mod reward;
pub mod snapshot;

pub use block::{Block, BlockComplete};
pub use chain::ChainState;
pub use error::ChainError;
pub use genesis::{Airdrop, GenesisData, NATIVE_DECIMALS};
pub use reward::{reward_at, BLOCKS_PER_CYCLE, BLOCK_TIME_SECS, INITIAL_REWARD_COINS};
pub use snapshot::ChainSnapshot;
