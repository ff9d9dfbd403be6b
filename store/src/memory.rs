//! In-memory [`Store`] backend for tests.
//!
//! Keeps the whole keyspace in a `BTreeMap`. An `update` clones the map,
//! mutates the clone, and swaps it back only on success, which reproduces
//! the discard-on-failure semantics of the LMDB backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use crate::{recover, Store, StoreError, StoreReader, StoreWriter};

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Serializes writers; readers only need the RwLock.
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, for test assertions.
    pub fn len(&self) -> usize {
        self.data.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemoryReader<'a> {
    data: &'a BTreeMap<Vec<u8>, Vec<u8>>,
}

impl StoreReader for MemoryReader<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.data.contains_key(key))
    }
}

struct MemoryWriter {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl StoreReader for MemoryWriter {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.data.contains_key(key))
    }
}

impl StoreWriter for MemoryWriter {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }
}

impl Store for MemoryStore {
    fn view<T, E>(&self, f: impl FnOnce(&dyn StoreReader) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let guard = self.data.read().expect("store lock poisoned");
        let reader = MemoryReader { data: &guard };
        recover(|| f(&reader))
    }

    fn update<T, E>(&self, f: impl FnOnce(&mut dyn StoreWriter) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _exclusive = self.write_lock.lock().expect("store lock poisoned");
        let snapshot = self.data.read().expect("store lock poisoned").clone();
        let mut writer = MemoryWriter { data: snapshot };
        let result = recover(|| f(&mut writer));
        if result.is_ok() {
            *self.data.write().expect("store lock poisoned") = writer.data;
        }
        result
    }
}
