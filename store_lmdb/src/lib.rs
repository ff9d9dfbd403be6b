//! LMDB storage backend for the Umbra ledger.
//!
//! Implements the [`Store`] contract from `umbra-store` using the `heed`
//! LMDB bindings: one environment, one unnamed database, `view` over a
//! read transaction and `update` over the single write transaction. The
//! write transaction is committed only when the closure succeeds; on any
//! error (or recovered panic) it is aborted and nothing persists.

pub mod error;

pub use error::LmdbError;

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use umbra_store::{recover, Store, StoreError, StoreReader, StoreWriter};

/// Default LMDB map size: 1 GiB.
const DEFAULT_MAP_SIZE: usize = 1 << 30;

pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path) -> Result<Self, LmdbError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("creating data dir: {e}")))?;

        // SAFETY: the environment directory is owned by this process and is
        // not opened twice (one LmdbStore per data dir).
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let db = env.create_database(&mut wtxn, None)?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened LMDB environment");
        Ok(Self { env, db })
    }
}

struct LmdbReader<'a> {
    txn: &'a RoTxn<'a>,
    db: Database<Bytes, Bytes>,
}

impl StoreReader for LmdbReader<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.db.get(self.txn, key).map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }
}

struct LmdbWriter<'a> {
    txn: RwTxn<'a>,
    db: Database<Bytes, Bytes>,
}

impl StoreReader for LmdbWriter<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.db.get(&self.txn, key).map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }
}

impl StoreWriter for LmdbWriter<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db
            .put(&mut self.txn, key, value)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.db
            .delete(&mut self.txn, key)
            .map_err(LmdbError::from)?;
        Ok(())
    }
}

impl Store for LmdbStore {
    fn view<T, E>(&self, f: impl FnOnce(&dyn StoreReader) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let txn = self
            .env
            .read_txn()
            .map_err(LmdbError::from)
            .map_err(StoreError::from)?;
        let reader = LmdbReader { txn: &txn, db: self.db };
        recover(|| f(&reader))
    }

    fn update<T, E>(&self, f: impl FnOnce(&mut dyn StoreWriter) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let txn = self
            .env
            .write_txn()
            .map_err(LmdbError::from)
            .map_err(StoreError::from)?;
        let mut writer = LmdbWriter { txn, db: self.db };
        match recover(|| f(&mut writer)) {
            Ok(value) => {
                writer
                    .txn
                    .commit()
                    .map_err(LmdbError::from)
                    .map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the RwTxn aborts it; nothing persists.
                Err(e)
            }
        }
    }
}
