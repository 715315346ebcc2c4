// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistent store port and in-memory reference implementation.
//!
//! The engine treats the store as an opaque durable collaborator keyed by
//! `(collection, id)`. Listing returns lightweight metadata projections;
//! the full document payload is fetched on demand before any operation
//! that inspects it.
//!
//! The engine is single-threaded and owns its store exclusively (see the
//! session crate), so every method takes `&mut self` — read paths are
//! allowed to warm internal caches. There is no store-side prune
//! operation: the session computes a [`crate::PrunePlan`] and issues
//! individual deletes.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::record::{CollectionKey, MetaPatch, SnapshotId, SnapshotMeta, SnapshotRecord};

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("snapshot not found")]
    NotFound,
    /// The id is unusable as a storage key.
    #[error("invalid snapshot id: {0:?}")]
    InvalidId(String),
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Payload failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Outcome of a bulk clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearOutcome {
    /// Records deleted.
    pub deleted: usize,
    /// Locked records preserved.
    pub locked_kept: usize,
}

/// One known collection and its record count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Collection key.
    pub key: CollectionKey,
    /// Number of records currently stored.
    pub count: usize,
}

/// Rejects ids that cannot safely name a storage key.
///
/// Empty ids, path separators, and `..` are refused before any path or
/// key is formed from them.
pub fn validate_snapshot_id(id: &SnapshotId) -> Result<(), StoreError> {
    let raw = id.as_str();
    if raw.is_empty() || raw.contains('/') || raw.contains('\\') || raw.contains("..") {
        return Err(StoreError::InvalidId(raw.to_owned()));
    }
    Ok(())
}

/// Durable snapshot store, keyed by `(collection, id)`.
pub trait SnapshotStore {
    /// Upserts one record by id. Atomic from the caller's perspective: a
    /// reader never observes a half-written record.
    fn put(&mut self, record: &SnapshotRecord) -> Result<(), StoreError>;

    /// All metadata for a collection, timestamp-ascending. No payloads.
    fn list(&mut self, collection: &CollectionKey) -> Result<Vec<SnapshotMeta>, StoreError>;

    /// One full record (with payload), or `None` when absent.
    fn get(
        &mut self,
        collection: &CollectionKey,
        id: &SnapshotId,
    ) -> Result<Option<SnapshotRecord>, StoreError>;

    /// Applies a restricted partial update. Returns `false` when the
    /// record does not exist.
    fn update_meta(
        &mut self,
        collection: &CollectionKey,
        id: &SnapshotId,
        patch: &MetaPatch,
    ) -> Result<bool, StoreError>;

    /// Removes one record. Removing an absent record is not an error.
    fn delete(&mut self, collection: &CollectionKey, id: &SnapshotId) -> Result<(), StoreError>;

    /// Removes every unlocked record of a collection; locked records
    /// survive.
    fn delete_all(&mut self, collection: &CollectionKey) -> Result<ClearOutcome, StoreError>;

    /// Every known collection with its record count, key-ascending.
    fn collections(&mut self) -> Result<Vec<CollectionInfo>, StoreError>;
}

/// BTreeMap-backed store for tests and in-process use.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: BTreeMap<CollectionKey, BTreeMap<SnapshotId, SnapshotRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    /// True when no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemoryStore {
    fn put(&mut self, record: &SnapshotRecord) -> Result<(), StoreError> {
        validate_snapshot_id(&record.meta.id)?;
        self.collections
            .entry(record.meta.collection.clone())
            .or_default()
            .insert(record.meta.id.clone(), record.clone());
        Ok(())
    }

    fn list(&mut self, collection: &CollectionKey) -> Result<Vec<SnapshotMeta>, StoreError> {
        let mut metas: Vec<SnapshotMeta> = self
            .collections
            .get(collection)
            .map(|records| records.values().map(|r| r.meta.clone()).collect())
            .unwrap_or_default();
        metas.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        Ok(metas)
    }

    fn get(
        &mut self,
        collection: &CollectionKey,
        id: &SnapshotId,
    ) -> Result<Option<SnapshotRecord>, StoreError> {
        validate_snapshot_id(id)?;
        Ok(self
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    fn update_meta(
        &mut self,
        collection: &CollectionKey,
        id: &SnapshotId,
        patch: &MetaPatch,
    ) -> Result<bool, StoreError> {
        validate_snapshot_id(id)?;
        let Some(record) = self
            .collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
        else {
            return Ok(false);
        };
        patch.apply(&mut record.meta);
        Ok(true)
    }

    fn delete(&mut self, collection: &CollectionKey, id: &SnapshotId) -> Result<(), StoreError> {
        validate_snapshot_id(id)?;
        if let Some(records) = self.collections.get_mut(collection) {
            records.remove(id);
            if records.is_empty() {
                self.collections.remove(collection);
            }
        }
        Ok(())
    }

    fn delete_all(&mut self, collection: &CollectionKey) -> Result<ClearOutcome, StoreError> {
        let Some(records) = self.collections.get_mut(collection) else {
            return Ok(ClearOutcome::default());
        };
        let before = records.len();
        records.retain(|_, r| r.meta.locked);
        let outcome = ClearOutcome {
            deleted: before - records.len(),
            locked_kept: records.len(),
        };
        if records.is_empty() {
            self.collections.remove(collection);
        }
        Ok(outcome)
    }

    fn collections(&mut self) -> Result<Vec<CollectionInfo>, StoreError> {
        Ok(self
            .collections
            .iter()
            .map(|(key, records)| CollectionInfo {
                key: key.clone(),
                count: records.len(),
            })
            .collect())
    }
}
