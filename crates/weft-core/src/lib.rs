// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! weft-core: branching snapshot engine for node-graph documents.
//!
//! The engine captures point-in-time copies of a mutable workflow document,
//! organizes them into a branching history, classifies what changed between
//! consecutive captures, computes structural diffs between any two captures,
//! and plans retention pruning that never destroys the lineage needed to
//! reconstruct the selected branch.
//!
//! Everything in this crate is pure data plus deterministic functions; the
//! capture orchestration (debounce, restore locks, wall clocks) lives in
//! `weft-session`, and durable storage adapters live in `weft-store-fs`.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod branch;
mod classify;
mod diff;
mod doc;
mod record;
mod retention;
mod store;
mod tree;

/// Fork-point selection map for branch navigation.
pub use branch::{display_path, select_branch_containing, BranchSelection, ForkKey};
/// Change classification between consecutive captures.
pub use classify::{classify, ChangeKind};
/// Structural diff between two documents.
pub use diff::{diff, preview, DiffSummary, FieldChange, GraphDiff, NodeModification};
/// Workflow document model and canonical hashing.
pub use doc::{Hash32, LinkId, NodeId, WorkflowDoc, WorkflowLink, WorkflowNode};
/// Snapshot record types and id derivation.
pub use record::{
    make_snapshot_id, CaptureSource, CollectionKey, MetaPatch, SnapshotId, SnapshotMeta,
    SnapshotRecord, Timestamp,
};
/// Retention planning (protected set + prune candidates).
pub use retention::{plan_prune, protected_set, PrunePlan};
/// Persistent store port and in-memory reference implementation.
pub use store::{
    validate_snapshot_id, ClearOutcome, CollectionInfo, MemoryStore, SnapshotStore, StoreError,
};
/// Derived snapshot tree (arena + parent/child indexes).
pub use tree::{SnapshotTree, TreeError};
