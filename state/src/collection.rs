//! Versioned key/element map with staged changes and per-height transition
//! logs.
//!
//! A collection keeps three layers: durable bytes in the store, a committed
//! in-memory overlay (speculative state promoted by [`commit_changes`]), and
//! pending staged changes. Staged changes become visible to readers of the
//! same collection immediately; they reach the overlay only on commit and the
//! store only on [`write_to_store`]. Before committing a block's changes, a
//! transition log records the prior bytes of every touched key so the block
//! can later be removed by replaying the log in reverse.
//!
//! [`commit_changes`]: VersionedCollection::commit_changes
//! [`write_to_store`]: VersionedCollection::write_to_store

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use umbra_store::{StoreReader, StoreWriter};

use crate::element::CollectionElement;
use crate::error::StateError;

/// A staged, not yet committed change to one key.
enum Change<E> {
    Updated(E),
    /// Restored from a transition log; keeps the recorded index instead of
    /// being treated as a fresh insert.
    Restored(E),
    Deleted,
}

/// Committed overlay entry. `value: None` is a tombstone awaiting a store
/// delete; `dirty` marks entries not yet flushed by `write_to_store`.
struct Committed<E> {
    value: Option<E>,
    dirty: bool,
}

/// One entry of a transition log: the serialized bytes a key held before the
/// change, or `None` if the key did not exist.
#[derive(Serialize, Deserialize)]
struct TransitionRecord {
    key: Vec<u8>,
    prior: Option<Vec<u8>>,
}

pub struct VersionedCollection<E: CollectionElement> {
    name: String,
    count: u64,
    pending: BTreeMap<Vec<u8>, Change<E>>,
    committed: BTreeMap<Vec<u8>, Committed<E>>,
}

impl<E: CollectionElement> VersionedCollection<E> {
    /// Open a collection, loading its element count from the store.
    pub fn new<R: StoreReader + ?Sized>(store: &R, name: &str) -> Result<Self, StateError> {
        let count = match store.get(&count_key(name))? {
            Some(bytes) => decode_count(name, &bytes)?,
            None => 0,
        };
        Ok(Self {
            name: name.to_string(),
            count,
            pending: BTreeMap::new(),
            committed: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live elements as of the last commit.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Read an element, observing staged changes first, then the committed
    /// overlay, then the store.
    pub fn get<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        key: &[u8],
    ) -> Result<Option<E>, StateError> {
        if let Some(change) = self.pending.get(key) {
            return Ok(match change {
                Change::Updated(e) | Change::Restored(e) => Some(e.clone()),
                Change::Deleted => None,
            });
        }
        if let Some(entry) = self.committed.get(key) {
            return Ok(entry.value.clone());
        }
        match store.get(&self.map_key(key))? {
            Some(bytes) => {
                let element = self.decode(&bytes)?;
                self.committed.insert(
                    key.to_vec(),
                    Committed {
                        value: Some(element.clone()),
                        dirty: false,
                    },
                );
                Ok(Some(element))
            }
            None => {
                self.committed.insert(key.to_vec(), Committed { value: None, dirty: false });
                Ok(None)
            }
        }
    }

    pub fn exists<R: StoreReader + ?Sized>(
        &mut self,
        store: &R,
        key: &[u8],
    ) -> Result<bool, StateError> {
        Ok(self.get(store, key)?.is_some())
    }

    /// Stage an insert or overwrite. Validation and index assignment happen
    /// at commit.
    pub fn update(&mut self, key: &[u8], element: E) {
        self.pending.insert(key.to_vec(), Change::Updated(element));
    }

    /// Stage a deletion; rejected for element types that forbid it.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        if !E::DELETABLE {
            return Err(StateError::NotDeletable(self.name.clone()));
        }
        self.pending.insert(key.to_vec(), Change::Deleted);
        Ok(())
    }

    /// Discard all staged changes; the committed overlay is untouched.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Promote staged changes into the committed overlay: validate every
    /// updated element, assign dense indexes to fresh inserts, and adjust the
    /// element count. Fails before touching the overlay, so a validation
    /// error leaves the collection committed-state intact.
    pub fn commit_changes<R: StoreReader + ?Sized>(&mut self, store: &R) -> Result<(), StateError> {
        let mut next_index = self.count;
        let mut deletions = 0u64;
        let mut plan: Vec<(Vec<u8>, Option<E>)> = Vec::with_capacity(self.pending.len());

        for (key, change) in &self.pending {
            let prior = self.lookup_committed(store, key)?;
            match change {
                Change::Updated(element) => {
                    let mut element = element.clone();
                    element.validate()?;
                    if prior.is_none() {
                        element.set_index(next_index);
                        next_index += 1;
                    }
                    plan.push((key.clone(), Some(element)));
                }
                Change::Restored(element) => {
                    if prior.is_none() {
                        next_index += 1;
                    }
                    plan.push((key.clone(), Some(element.clone())));
                }
                Change::Deleted => {
                    if prior.is_some() {
                        deletions += 1;
                    }
                    plan.push((key.clone(), None));
                }
            }
        }

        for (key, value) in plan {
            self.committed.insert(key, Committed { value, dirty: true });
        }
        self.count = next_index - deletions;
        self.pending.clear();
        Ok(())
    }

    /// Flush dirty overlay entries and the element count to the store.
    pub fn write_to_store<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
    ) -> Result<(), StateError> {
        let mut flushed = false;
        let name = self.name.clone();
        for (key, entry) in &mut self.committed {
            if !entry.dirty {
                continue;
            }
            flushed = true;
            let map_key = [name.as_bytes(), b":map:", key.as_slice()].concat();
            match &entry.value {
                Some(element) => {
                    let bytes = encode(&name, element)?;
                    store.put(&map_key, &bytes)?;
                }
                None => store.delete(&map_key)?,
            }
            entry.dirty = false;
        }
        if flushed {
            store.put(&count_key(&name), &self.count.to_le_bytes())?;
        }
        Ok(())
    }

    /// Record the prior bytes of every staged key under the given height.
    /// Must run before `commit_changes` for the same batch. Returns whether a
    /// log was written.
    pub fn write_transition_log<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
        height: u64,
    ) -> Result<bool, StateError> {
        if self.pending.is_empty() {
            return Ok(false);
        }
        let mut records = Vec::with_capacity(self.pending.len());
        for key in self.pending.keys() {
            let prior = match self.committed.get(key) {
                Some(entry) => match &entry.value {
                    Some(element) => Some(encode(&self.name, element)?),
                    None => None,
                },
                None => store.get(&self.map_key(key))?,
            };
            records.push(TransitionRecord { key: key.clone(), prior });
        }
        let bytes = bincode::serialize(&records).map_err(|e| StateError::Encode {
            collection: self.name.clone(),
            reason: e.to_string(),
        })?;
        store.put(&self.transition_key(height), &bytes)?;
        Ok(true)
    }

    /// Replay the transition log for a height in reverse, staging the prior
    /// value of every key it names, then delete the log. A missing log means
    /// the height touched nothing in this collection.
    pub fn apply_transition_log<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
        height: u64,
    ) -> Result<(), StateError> {
        let log_key = self.transition_key(height);
        let Some(bytes) = store.get(&log_key)? else {
            return Ok(());
        };
        let records: Vec<TransitionRecord> =
            bincode::deserialize(&bytes).map_err(|e| StateError::Decode {
                collection: self.name.clone(),
                reason: e.to_string(),
            })?;
        for record in records.iter().rev() {
            match &record.prior {
                Some(prior) => {
                    let element = self.decode(prior)?;
                    self.pending.insert(record.key.clone(), Change::Restored(element));
                }
                // The key did not exist before the change; restoring means
                // removing it, even for non-deletable element types.
                None => {
                    self.pending.insert(record.key.clone(), Change::Deleted);
                }
            }
        }
        store.delete(&log_key)?;
        Ok(())
    }

    /// Drop the transition log for a height without replaying it.
    pub fn delete_transition_log<W: StoreWriter + ?Sized>(
        &mut self,
        store: &mut W,
        height: u64,
    ) -> Result<(), StateError> {
        store.delete(&self.transition_key(height))?;
        Ok(())
    }

    /// Committed view of a key, skipping pending changes. Does not populate
    /// the cache; usable while iterating `pending`.
    fn lookup_committed<R: StoreReader + ?Sized>(
        &self,
        store: &R,
        key: &[u8],
    ) -> Result<Option<E>, StateError> {
        if let Some(entry) = self.committed.get(key) {
            return Ok(entry.value.clone());
        }
        match store.get(&self.map_key(key))? {
            Some(bytes) => Ok(Some(self.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn map_key(&self, key: &[u8]) -> Vec<u8> {
        [self.name.as_bytes(), b":map:", key].concat()
    }

    fn transition_key(&self, height: u64) -> Vec<u8> {
        format!("{}:transitions:{}", self.name, height).into_bytes()
    }

    fn decode(&self, bytes: &[u8]) -> Result<E, StateError> {
        bincode::deserialize(bytes).map_err(|e| StateError::Decode {
            collection: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

fn encode<E: CollectionElement>(name: &str, element: &E) -> Result<Vec<u8>, StateError> {
    bincode::serialize(element).map_err(|e| StateError::Encode {
        collection: name.to_string(),
        reason: e.to_string(),
    })
}

fn count_key(name: &str) -> Vec<u8> {
    format!("{name}:count").into_bytes()
}

fn decode_count(name: &str, bytes: &[u8]) -> Result<u64, StateError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| StateError::Decode {
        collection: name.to_string(),
        reason: format!("count value has {} bytes, expected 8", bytes.len()),
    })?;
    Ok(u64::from_le_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use umbra_store::{MemoryStore, Store};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Token {
        index: u64,
        value: u64,
    }

    impl CollectionElement for Token {
        const DELETABLE: bool = true;

        fn index(&self) -> u64 {
            self.index
        }

        fn set_index(&mut self, index: u64) {
            self.index = index;
        }

        fn validate(&self) -> Result<(), StateError> {
            if self.value == u64::MAX {
                return Err(StateError::Validation {
                    collection: "tokens".into(),
                    reason: "reserved value".into(),
                });
            }
            Ok(())
        }
    }

    fn token(value: u64) -> Token {
        Token { index: 0, value }
    }

    #[test]
    fn staged_changes_visible_before_commit() {
        let store = MemoryStore::new();
        store
            .view(|r| {
                let mut col = VersionedCollection::<Token>::new(r, "tokens")?;
                col.update(b"a", token(1));
                assert_eq!(col.get(r, b"a")?.unwrap().value, 1);
                col.rollback();
                assert!(col.get(r, b"a")?.is_none());
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn commit_assigns_dense_indexes_and_counts() {
        let store = MemoryStore::new();
        store
            .update(|w| {
                let mut col = VersionedCollection::<Token>::new(w, "tokens")?;
                col.update(b"a", token(1));
                col.update(b"b", token(2));
                col.commit_changes(w)?;
                assert_eq!(col.count(), 2);
                assert_eq!(col.get(w, b"a")?.unwrap().index, 0);
                assert_eq!(col.get(w, b"b")?.unwrap().index, 1);

                // Overwrite keeps the index; delete shrinks the count.
                col.update(b"a", token(10));
                col.delete(b"b")?;
                col.commit_changes(w)?;
                assert_eq!(col.count(), 1);
                assert_eq!(col.get(w, b"a")?.unwrap().index, 0);
                col.write_to_store(w)?;
                Ok::<_, StateError>(())
            })
            .unwrap();

        // Count survives reopen.
        store
            .view(|r| {
                let col = VersionedCollection::<Token>::new(r, "tokens")?;
                assert_eq!(col.count(), 1);
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn validation_failure_leaves_overlay_untouched() {
        let store = MemoryStore::new();
        store
            .update(|w| {
                let mut col = VersionedCollection::<Token>::new(w, "tokens")?;
                col.update(b"a", token(1));
                col.commit_changes(w)?;

                col.update(b"a", token(u64::MAX));
                assert!(col.commit_changes(w).is_err());
                // The failure happens before promotion; rolling back the
                // staged batch recovers the committed value.
                col.rollback();
                assert_eq!(col.get(w, b"a")?.unwrap().value, 1);
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn transition_log_restores_prior_bytes() {
        let store = MemoryStore::new();
        store
            .update(|w| {
                let mut col = VersionedCollection::<Token>::new(w, "tokens")?;
                col.update(b"a", token(1));
                col.commit_changes(w)?;
                col.write_to_store(w)?;
                let before = w.get(&col.map_key(b"a"))?.unwrap();

                // Height 5 overwrites `a` and creates `b`.
                col.update(b"a", token(100));
                col.update(b"b", token(2));
                assert!(col.write_transition_log(w, 5)?);
                col.commit_changes(w)?;
                col.write_to_store(w)?;
                assert_eq!(col.count(), 2);

                // Removing height 5 restores `a` byte-exactly and drops `b`.
                col.apply_transition_log(w, 5)?;
                col.commit_changes(w)?;
                col.write_to_store(w)?;
                assert_eq!(col.count(), 1);
                assert_eq!(w.get(&col.map_key(b"a"))?.unwrap(), before);
                assert!(w.get(&col.map_key(b"b"))?.is_none());
                // The log is consumed.
                assert!(w.get(&col.transition_key(5))?.is_none());
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn empty_batch_writes_no_log() {
        let store = MemoryStore::new();
        store
            .update(|w| {
                let mut col = VersionedCollection::<Token>::new(w, "tokens")?;
                assert!(!col.write_transition_log(w, 1)?);
                // Applying a missing log is a no-op.
                col.apply_transition_log(w, 1)?;
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn non_deletable_elements_reject_delete() {
        let store = MemoryStore::new();
        store
            .view(|r| {
                let mut col = VersionedCollection::<crate::Account>::new(r, "accounts")?;
                assert!(matches!(col.delete(b"x"), Err(StateError::NotDeletable(_))));
                Ok::<_, StateError>(())
            })
            .unwrap();
    }
}
