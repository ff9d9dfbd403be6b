//! Abstract transactional key-value storage for the Umbra ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements the
//! [`Store`] trait. The rest of the workspace depends only on the traits:
//! reads run inside [`Store::view`], mutations inside [`Store::update`].
//! An `update` is atomic — either the closure succeeds and every `put` /
//! `delete` becomes durable together, or it fails and nothing does.

pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use std::panic::{catch_unwind, AssertUnwindSafe};

/// Read-only handle passed to [`Store::view`] and [`Store::update`] closures.
pub trait StoreReader {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Writable handle passed to [`Store::update`] closures.
pub trait StoreWriter: StoreReader {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;
}

/// A transactional key-value store.
///
/// One `update` transaction runs at a time; `view` transactions may run
/// concurrently with each other per the backend's isolation contract.
/// Closures return the caller's own error type, which must absorb
/// [`StoreError`] — backend failures (and recovered panics) convert into it.
pub trait Store: Send + Sync {
    fn view<T, E>(&self, f: impl FnOnce(&dyn StoreReader) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>;

    fn update<T, E>(&self, f: impl FnOnce(&mut dyn StoreWriter) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>;
}

/// Run a transaction closure under a panic guard.
///
/// Any unexpected fault inside a transaction callback is converted into a
/// reported [`StoreError::Panic`] instead of crashing the node; the backend
/// then treats the transaction as failed and discards it. Unwind safety is
/// asserted because the transaction's effects are discarded on failure.
pub fn recover<T, E, F>(f: F) -> Result<T, E>
where
    E: From<StoreError>,
    F: FnOnce() -> Result<T, E>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(panic = %msg, "panic inside store transaction");
            Err(StoreError::Panic(msg).into())
        }
    }
}
