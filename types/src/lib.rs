//! Fundamental types for the Umbra ledger.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: hashes, public keys, timestamps, checked amount arithmetic, and
//! the Blake2b digest helpers used for block and transaction identities.

pub mod amount;
pub mod hash;
pub mod hashing;
pub mod keys;
pub mod time;

pub use amount::ArithmeticError;
pub use hash::Hash32;
pub use hashing::{blake2b_256, blake2b_256_parts};
pub use keys::PublicKey;
pub use time::Timestamp;
