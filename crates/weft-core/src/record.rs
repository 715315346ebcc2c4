// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snapshot record types and id derivation.
//!
//! A snapshot record is immutable once created except for a small metadata
//! subset (`label`, `notes`, `locked`, and — only when a deleted record's
//! children are re-parented — `parent`). The record splits into
//! [`SnapshotMeta`] (everything a tree or list view needs) and the full
//! document payload, so stores can serve lightweight projections and load
//! payloads on demand.

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::classify::ChangeKind;
use crate::doc::{Hash32, WorkflowDoc};

/// Capture time in milliseconds since the Unix epoch.
///
/// Supplied by the caller (the session driver stamps wall-clock time; tests
/// pass fixed values). Used for ordering and legacy chaining; not required
/// to be strictly increasing across records.
pub type Timestamp = u64;

/// Opaque unique snapshot identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Wraps an existing identifier (e.g. one read back from a store).
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key grouping records into one independent history (one per document
/// identity as the host editor defines it).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionKey(String);

impl CollectionKey {
    /// Wraps a collection key.
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives a snapshot id from capture inputs.
///
/// Domain-separated BLAKE3 over `(collection, timestamp, content hash,
/// sequence)`, truncated to 16 bytes of hex. The sequence number breaks
/// collisions when two captures of identical content land on the same
/// millisecond.
#[must_use]
pub fn make_snapshot_id(
    collection: &CollectionKey,
    at: Timestamp,
    content: &Hash32,
    seq: u64,
) -> SnapshotId {
    let mut hasher = Hasher::new();
    hasher.update(b"snap:");
    hasher.update(collection.as_str().as_bytes());
    hasher.update(&at.to_le_bytes());
    hasher.update(content);
    hasher.update(&seq.to_le_bytes());
    let digest: Hash32 = hasher.finalize().into();
    SnapshotId(hex::encode(&digest[..16]))
}

/// Origin of a capture. Each source feeds an independent retention pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Debounced editor edits and explicit user captures.
    Interactive,
    /// Graph-embedded trigger node firing during execution.
    Programmatic,
}

impl Default for CaptureSource {
    fn default() -> Self {
        Self::Interactive
    }
}

/// Snapshot metadata: everything except the document payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Unique identifier, assigned at capture time.
    pub id: SnapshotId,
    /// History this record belongs to.
    pub collection: CollectionKey,
    /// Capture time (milliseconds since epoch).
    pub timestamp: Timestamp,
    /// Human-readable name. Mutable.
    pub label: String,
    /// Node count cached at capture time.
    pub element_count: usize,
    /// Excludes the record from retention pruning and bulk clear. Mutable.
    #[serde(default)]
    pub locked: bool,
    /// Free-form user notes. Mutable.
    #[serde(default)]
    pub notes: Option<String>,
    /// Classification relative to the previous capture in this collection.
    pub change: ChangeKind,
    /// Capture origin (retention pool selector).
    #[serde(default)]
    pub source: CaptureSource,
    /// Record this one was captured from. `None` marks a branch root or a
    /// legacy record predating parent links.
    #[serde(default)]
    pub parent: Option<SnapshotId>,
}

/// Full snapshot record: metadata plus the captured document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Record metadata.
    #[serde(flatten)]
    pub meta: SnapshotMeta,
    /// Full document copy taken at capture time. Never mutated.
    pub document: WorkflowDoc,
}

/// Partial metadata update.
///
/// Only the four mutable fields are expressible; `id`, `document`,
/// `change`, and `timestamp` have no patch surface at all. The nested
/// options distinguish "leave untouched" (outer `None`) from "clear"
/// (inner `None`).
#[derive(Debug, Clone, Default)]
pub struct MetaPatch {
    /// Replacement label.
    pub label: Option<String>,
    /// Replacement notes (`Some(None)` clears them).
    pub notes: Option<Option<String>>,
    /// Replacement lock flag.
    pub locked: Option<bool>,
    /// Replacement parent link (`Some(None)` detaches). Only used when a
    /// deleted record's children are re-parented.
    pub parent: Option<Option<SnapshotId>>,
}

impl MetaPatch {
    /// True when the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.notes.is_none() && self.locked.is_none() && self.parent.is_none()
    }

    /// Applies the patch to a metadata record in place.
    pub fn apply(&self, meta: &mut SnapshotMeta) {
        if let Some(label) = &self.label {
            meta.label.clone_from(label);
        }
        if let Some(notes) = &self.notes {
            meta.notes.clone_from(notes);
        }
        if let Some(locked) = self.locked {
            meta.locked = locked;
        }
        if let Some(parent) = &self.parent {
            meta.parent.clone_from(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_ids_are_distinct_per_sequence() {
        let key = CollectionKey::new("flow.json");
        let content = [7u8; 32];
        let a = make_snapshot_id(&key, 1_000, &content, 0);
        let b = make_snapshot_id(&key, 1_000, &content, 1);
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn meta_patch_clears_and_sets() {
        let mut meta = SnapshotMeta {
            id: SnapshotId::new("a"),
            collection: CollectionKey::new("flow.json"),
            timestamp: 1,
            label: "old".into(),
            element_count: 2,
            locked: false,
            notes: Some("keep?".into()),
            change: ChangeKind::Initial,
            source: CaptureSource::Interactive,
            parent: None,
        };
        let patch = MetaPatch {
            label: Some("new".into()),
            notes: Some(None),
            locked: Some(true),
            parent: Some(Some(SnapshotId::new("b"))),
        };
        patch.apply(&mut meta);
        assert_eq!(meta.label, "new");
        assert_eq!(meta.notes, None);
        assert!(meta.locked);
        assert_eq!(meta.parent, Some(SnapshotId::new("b")));
        assert!(MetaPatch::default().is_empty());
    }
}
