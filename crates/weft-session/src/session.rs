// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-collection session context.
//!
//! Everything the orchestrator remembers between events lives here, one
//! instance per open collection: the last-captured hash/document/id, the
//! swap bookmarks a restore sets, the branch selection, and the timing
//! phase. Switching collections replaces the whole struct, which is also
//! what resets the branch selection — there is no separate clear step to
//! forget.

use std::time::Instant;

use weft_core::{BranchSelection, CollectionKey, Hash32, SnapshotId, WorkflowDoc};

/// Timing phase of the capture state machine.
///
/// `Capturing` from the design docs is not represented: a capture runs to
/// completion inside a single event (the engine is single-threaded and
/// cooperative), so the phase is only ever observable as one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing scheduled.
    Idle,
    /// An automatic capture fires when `deadline` passes.
    PendingDebounce {
        /// When the debounce window closes.
        deadline: Instant,
    },
    /// A restore is settling; edits are absorbed until `until` passes.
    RestoreLocked {
        /// When the guard window closes.
        until: Instant,
    },
}

/// Mutable session state for one open collection.
#[derive(Debug, Clone)]
pub struct EngineSession {
    pub(crate) collection: CollectionKey,
    /// Content hash of the last captured document (dedup check).
    pub(crate) last_hash: Option<Hash32>,
    /// Last captured document (classification baseline).
    pub(crate) last_document: Option<WorkflowDoc>,
    /// Id of the last captured record (continuation parent).
    pub(crate) last_id: Option<SnapshotId>,
    /// Snapshot currently swapped in by a restore; the next capture forks
    /// from it. Cleared by every successful capture.
    pub(crate) swapped_to: Option<SnapshotId>,
    /// Bookmark record captured just before the first swap away from live
    /// work. Cleared by every successful capture.
    pub(crate) pre_swap_current: Option<SnapshotId>,
    /// Branch choices for this collection.
    pub(crate) selection: BranchSelection,
    /// Capture sequence number (id-derivation nonce).
    pub(crate) seq: u64,
    /// Current timing phase.
    pub(crate) phase: Phase,
}

impl EngineSession {
    /// Fresh session for `collection`.
    #[must_use]
    pub fn new(collection: CollectionKey) -> Self {
        Self {
            collection,
            last_hash: None,
            last_document: None,
            last_id: None,
            swapped_to: None,
            pre_swap_current: None,
            selection: BranchSelection::new(),
            seq: 0,
            phase: Phase::Idle,
        }
    }

    /// Collection this session serves.
    #[must_use]
    pub fn collection(&self) -> &CollectionKey {
        &self.collection
    }

    /// Current timing phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Snapshot currently swapped in, if a restore is in effect.
    #[must_use]
    pub fn swapped_to(&self) -> Option<&SnapshotId> {
        self.swapped_to.as_ref()
    }
}
