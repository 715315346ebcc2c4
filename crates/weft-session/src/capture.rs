// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Capture orchestration.
//!
//! [`CaptureService`] is the state machine that decides when a snapshot is
//! taken: edit events debounce into at most one pending capture, unchanged
//! content is dropped by hash, and a restore in flight locks capturing
//! until its echo edits settle. Every time-sensitive method takes an
//! explicit `now: Instant` (and wall-clock captures take `at`), so tests
//! drive the machine without real timers; the tokio driver supplies real
//! time.
//!
//! Failure policy: collaborator errors never abort a state transition.
//! They are logged, surfaced on the notice queue, and the affected
//! operation becomes a no-op — bookkeeping is only updated after the
//! store accepts a record, so a retry on the next cycle is safe.

use std::time::Instant;

use tracing::{debug, info, warn};
use weft_app::notify::{NoticeKind, NoticeQueue};
use weft_core::{
    classify, diff, display_path, make_snapshot_id, plan_prune, select_branch_containing,
    CaptureSource, ClearOutcome, CollectionKey, GraphDiff, MetaPatch, SnapshotId, SnapshotMeta,
    SnapshotRecord, SnapshotStore, SnapshotTree, Timestamp,
};

use crate::config::SessionConfig;
use crate::session::{EngineSession, Phase};
use crate::source::{DocumentSource, LoadMode};

/// Capture orchestrator for one open collection.
pub struct CaptureService<S, D> {
    store: S,
    source: D,
    config: SessionConfig,
    session: EngineSession,
    notices: NoticeQueue,
}

impl<S, D> CaptureService<S, D>
where
    S: SnapshotStore,
    D: DocumentSource,
{
    /// Creates a service over `store` and `source`, opening `collection`.
    pub fn new(store: S, source: D, config: SessionConfig, collection: CollectionKey) -> Self {
        Self {
            store,
            source,
            config: config.normalized(),
            session: EngineSession::new(collection),
            notices: NoticeQueue::default(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Session state (read-only).
    #[must_use]
    pub fn session(&self) -> &EngineSession {
        &self.session
    }

    /// Underlying store (read-only).
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Document source (read-only).
    #[must_use]
    pub fn source(&self) -> &D {
        &self.source
    }

    /// Document source, mutable (host bindings push live-state handles
    /// through this).
    pub fn source_mut(&mut self) -> &mut D {
        &mut self.source
    }

    /// Pending user-facing notices.
    #[must_use]
    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    /// Pending user-facing notices, mutable (drain/expire).
    pub fn notices_mut(&mut self) -> &mut NoticeQueue {
        &mut self.notices
    }

    /// Tears the service apart (driver shutdown, tests).
    pub fn into_parts(self) -> (S, D) {
        (self.store, self.source)
    }

    /// Next instant [`Self::tick`] should run, if any work is scheduled.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.session.phase {
            Phase::Idle => None,
            Phase::PendingDebounce { deadline } => Some(deadline),
            Phase::RestoreLocked { until } => Some(until),
        }
    }

    /// True while a restore is settling. Expired locks release lazily.
    pub fn is_restore_locked(&mut self, now: Instant) -> bool {
        match self.session.phase {
            Phase::RestoreLocked { until } if now < until => true,
            Phase::RestoreLocked { .. } => {
                debug!("restore lock released");
                self.session.phase = Phase::Idle;
                false
            }
            _ => false,
        }
    }

    /// Records an edit event.
    ///
    /// Starts or restarts the single debounce window (last-edit-wins
    /// coalescing). Edits during the restore guard are echo noise from the
    /// load itself and are absorbed.
    pub fn note_edit(&mut self, now: Instant) {
        if !self.config.auto_capture {
            return;
        }
        if self.is_restore_locked(now) {
            debug!("edit absorbed by restore lock");
            return;
        }
        self.session.phase = Phase::PendingDebounce {
            deadline: now + self.config.debounce(),
        };
    }

    /// Cancels a pending automatic capture (nothing persisted yet, so
    /// there is nothing to roll back).
    pub fn cancel_pending(&mut self) {
        if matches!(self.session.phase, Phase::PendingDebounce { .. }) {
            self.session.phase = Phase::Idle;
        }
    }

    /// Advances the state machine. Call when a deadline from
    /// [`Self::next_deadline`] has passed.
    ///
    /// Returns the id of a newly captured snapshot when the debounce
    /// window closed and the capture went through.
    pub fn tick(&mut self, now: Instant, at: Timestamp) -> Option<SnapshotId> {
        match self.session.phase {
            Phase::RestoreLocked { until } if now >= until => {
                debug!("restore lock released");
                self.session.phase = Phase::Idle;
                None
            }
            Phase::PendingDebounce { deadline } if now >= deadline => {
                self.session.phase = Phase::Idle;
                self.run_capture(None, CaptureSource::Interactive, now, at)
            }
            _ => None,
        }
    }

    /// Explicit user-named capture. Bypasses the debounce window but still
    /// honors the restore lock and content dedup.
    pub fn capture_manual(&mut self, label: &str, now: Instant, at: Timestamp) -> Option<SnapshotId> {
        if self.is_restore_locked(now) {
            debug!("manual capture skipped: restore in flight");
            return None;
        }
        // An explicit capture supersedes whatever was pending.
        self.session.phase = Phase::Idle;
        self.run_capture(Some(label.to_owned()), CaptureSource::Interactive, now, at)
    }

    /// Capture requested by a graph-embedded trigger node. Its records
    /// live in the programmatic retention pool.
    pub fn capture_programmatic(
        &mut self,
        label: &str,
        now: Instant,
        at: Timestamp,
    ) -> Option<SnapshotId> {
        if self.is_restore_locked(now) {
            debug!("trigger capture skipped: restore in flight");
            return None;
        }
        self.session.phase = Phase::Idle;
        self.run_capture(Some(label.to_owned()), CaptureSource::Programmatic, now, at)
    }

    /// Swaps the live document for a stored snapshot.
    ///
    /// Unless the live document is already a swapped-in snapshot, a
    /// synthetic bookmark capture preserves it first (so swapping away
    /// from unsaved work never loses it). The restore lock then absorbs
    /// the edit events the load itself echoes back.
    pub fn restore(&mut self, id: &SnapshotId, now: Instant, at: Timestamp) -> bool {
        let target = match self.store.get(self.session.collection(), id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.notify(NoticeKind::Error, "Snapshot not found", None, now);
                return false;
            }
            Err(err) => {
                warn!(error = %err, "restore: store read failed");
                self.notify(NoticeKind::Error, "Couldn't read snapshot", Some(err.to_string()), now);
                return false;
            }
        };
        if target.document.is_empty() {
            self.notify(NoticeKind::Error, "Snapshot has no nodes", None, now);
            return false;
        }

        self.cancel_pending();

        // Bookmark the live document unless it is itself a swapped-in
        // snapshot (swapping between snapshots must not spam bookmarks).
        if self.session.swapped_to.is_none() {
            if let Some(bookmark) = self.run_capture(
                Some(self.config.bookmark_label.clone()),
                CaptureSource::Interactive,
                now,
                at,
            ) {
                self.session.pre_swap_current = Some(bookmark);
            }
        }

        if let Err(err) = self.source.load(&target.document, LoadMode::Replace) {
            warn!(error = %err, "restore: load failed");
            self.notify(NoticeKind::Error, "Couldn't load snapshot", Some(err.to_string()), now);
            self.session.phase = Phase::Idle;
            return false;
        }

        // The restored document is now the classification baseline and the
        // dedup reference: a stray echo capture of identical content must
        // drop, and the next real edit classifies against this document.
        self.session.last_hash = Some(target.document.content_hash());
        self.session.last_document = Some(target.document);
        self.session.swapped_to = Some(id.clone());
        self.session.phase = Phase::RestoreLocked {
            until: now + self.config.restore_guard(),
        };
        info!(snapshot = %id, "restored snapshot");
        true
    }

    /// Deletes one snapshot, re-parenting its explicitly linked children
    /// onto its own parent so a fork collapses instead of orphaning.
    pub fn delete_snapshot(&mut self, id: &SnapshotId, now: Instant) -> bool {
        let tree = self.tree(now);
        let Some(meta) = tree.meta(id) else {
            self.notify(NoticeKind::Warn, "Snapshot already gone", None, now);
            return false;
        };
        let declared_parent = meta.parent.clone();

        // Only explicitly linked children re-parent; legacy records keep
        // chaining chronologically on their own.
        let linked_children: Vec<SnapshotId> = tree
            .iter()
            .filter(|m| m.parent.as_ref() == Some(id))
            .map(|m| m.id.clone())
            .collect();
        for child in &linked_children {
            let patch = MetaPatch {
                parent: Some(declared_parent.clone()),
                ..MetaPatch::default()
            };
            if let Err(err) = self.store.update_meta(self.session.collection(), child, &patch) {
                warn!(error = %err, child = %child, "re-parent failed");
                self.notify(NoticeKind::Error, "Couldn't re-parent child snapshot", Some(err.to_string()), now);
                return false;
            }
        }

        if let Err(err) = self.store.delete(self.session.collection(), id) {
            warn!(error = %err, "delete failed");
            self.notify(NoticeKind::Error, "Couldn't delete snapshot", Some(err.to_string()), now);
            return false;
        }

        if self.session.swapped_to.as_ref() == Some(id) {
            self.session.swapped_to = None;
        }
        if self.session.pre_swap_current.as_ref() == Some(id) {
            self.session.pre_swap_current = None;
        }
        if self.session.last_id.as_ref() == Some(id) {
            // Continue the lineage from the deleted record's parent.
            self.session.last_id = declared_parent;
        }
        info!(snapshot = %id, "deleted snapshot");
        true
    }

    /// Deletes every unlocked record of the open collection and resets
    /// session bookkeeping.
    pub fn clear_all(&mut self, now: Instant) -> ClearOutcome {
        match self.store.delete_all(self.session.collection()) {
            Ok(outcome) => {
                let collection = self.session.collection().clone();
                self.session = EngineSession::new(collection);
                info!(deleted = outcome.deleted, kept = outcome.locked_kept, "cleared history");
                self.notify(
                    NoticeKind::Info,
                    "History cleared",
                    Some(format!(
                        "{} deleted, {} locked kept",
                        outcome.deleted, outcome.locked_kept
                    )),
                    now,
                );
                outcome
            }
            Err(err) => {
                warn!(error = %err, "clear failed");
                self.notify(NoticeKind::Error, "Couldn't clear history", Some(err.to_string()), now);
                ClearOutcome::default()
            }
        }
    }

    /// Renames a snapshot.
    pub fn set_label(&mut self, id: &SnapshotId, label: &str, now: Instant) -> bool {
        self.patch_meta(
            id,
            MetaPatch {
                label: Some(label.to_owned()),
                ..MetaPatch::default()
            },
            now,
        )
    }

    /// Sets or clears a snapshot's notes.
    pub fn set_notes(&mut self, id: &SnapshotId, notes: Option<String>, now: Instant) -> bool {
        self.patch_meta(
            id,
            MetaPatch {
                notes: Some(notes),
                ..MetaPatch::default()
            },
            now,
        )
    }

    /// Locks or unlocks a snapshot (locked records survive pruning and
    /// bulk clear).
    pub fn set_locked(&mut self, id: &SnapshotId, locked: bool, now: Instant) -> bool {
        self.patch_meta(
            id,
            MetaPatch {
                locked: Some(locked),
                ..MetaPatch::default()
            },
            now,
        )
    }

    /// Imports records migrated from an older store. Returns how many were
    /// accepted; records with unusable ids are skipped.
    pub fn import(&mut self, records: Vec<SnapshotRecord>, now: Instant) -> usize {
        let mut imported = 0usize;
        for record in &records {
            match self.store.put(record) {
                Ok(()) => imported += 1,
                Err(err) => {
                    debug!(error = %err, id = %record.meta.id, "import skipped record");
                }
            }
        }
        if imported > 0 {
            self.notify(
                NoticeKind::Info,
                "Snapshots imported",
                Some(format!("{imported} of {}", records.len())),
                now,
            );
        }
        imported
    }

    /// Switches to another collection: the whole per-collection session
    /// context (bookmarks, hashes, branch selection, pending timers) is
    /// replaced, not cleared piecemeal.
    pub fn switch_collection(&mut self, collection: CollectionKey) {
        debug!(collection = %collection, "switched collection");
        self.session = EngineSession::new(collection);
    }

    /// Builds the snapshot tree for the open collection. Store failures
    /// surface as notices and yield an empty tree.
    pub fn tree(&mut self, now: Instant) -> SnapshotTree {
        match self.store.list(self.session.collection()) {
            Ok(metas) => SnapshotTree::build(metas),
            Err(err) => {
                warn!(error = %err, "list failed");
                self.notify(NoticeKind::Error, "Couldn't read history", Some(err.to_string()), now);
                SnapshotTree::default()
            }
        }
    }

    /// The active linear path (root first) under the current selection.
    pub fn display_path(&mut self, now: Instant) -> Vec<SnapshotId> {
        let tree = self.tree(now);
        display_path(&tree, &self.session.selection)
    }

    /// Re-routes the active path through `id`.
    pub fn select_branch(&mut self, id: &SnapshotId, now: Instant) -> bool {
        let tree = self.tree(now);
        match select_branch_containing(&tree, id, &mut self.session.selection) {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "branch selection failed");
                self.notify(NoticeKind::Warn, "Snapshot not in history", None, now);
                false
            }
        }
    }

    /// Structural diff between two stored snapshots (`base -> target`).
    pub fn diff_between(
        &mut self,
        base: &SnapshotId,
        target: &SnapshotId,
        now: Instant,
    ) -> Option<GraphDiff> {
        let base_record = self.fetch(base, now)?;
        let target_record = self.fetch(target, now)?;
        Some(diff(&base_record.document, &target_record.document))
    }

    fn fetch(&mut self, id: &SnapshotId, now: Instant) -> Option<SnapshotRecord> {
        match self.store.get(self.session.collection(), id) {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                self.notify(NoticeKind::Warn, "Snapshot not found", Some(id.to_string()), now);
                None
            }
            Err(err) => {
                warn!(error = %err, "read failed");
                self.notify(NoticeKind::Error, "Couldn't read snapshot", Some(err.to_string()), now);
                None
            }
        }
    }

    fn patch_meta(&mut self, id: &SnapshotId, patch: MetaPatch, now: Instant) -> bool {
        match self.store.update_meta(self.session.collection(), id, &patch) {
            Ok(true) => true,
            Ok(false) => {
                self.notify(NoticeKind::Warn, "Snapshot not found", Some(id.to_string()), now);
                false
            }
            Err(err) => {
                warn!(error = %err, "metadata update failed");
                self.notify(NoticeKind::Error, "Couldn't update snapshot", Some(err.to_string()), now);
                false
            }
        }
    }

    /// The `Capturing` phase: runs to completion within one event.
    ///
    /// Skips silently on an empty/absent document or unchanged content.
    /// Bookkeeping (hash/document/id, swap pointers) is updated only after
    /// the store accepts the record, so a failed put leaves the session
    /// exactly where it was.
    fn run_capture(
        &mut self,
        label: Option<String>,
        source: CaptureSource,
        now: Instant,
        at: Timestamp,
    ) -> Option<SnapshotId> {
        let document = match self.source.serialize_current() {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!("capture skipped: no document");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "capture: serialize failed");
                self.notify(NoticeKind::Error, "Couldn't read document", Some(err.to_string()), now);
                return None;
            }
        };
        if document.is_empty() {
            debug!("capture skipped: empty document");
            return None;
        }

        let hash = document.content_hash();
        if self.session.last_hash == Some(hash) {
            debug!("capture skipped: content unchanged");
            return None;
        }

        let change = classify(self.session.last_document.as_ref(), &document);
        let parent = self
            .session
            .swapped_to
            .clone()
            .or_else(|| self.session.last_id.clone());
        let label = label.unwrap_or_else(|| format!("Auto: {}", change.describe()));
        let id = make_snapshot_id(self.session.collection(), at, &hash, self.session.seq);

        let record = SnapshotRecord {
            meta: SnapshotMeta {
                id: id.clone(),
                collection: self.session.collection().clone(),
                timestamp: at,
                label,
                element_count: document.nodes.len(),
                locked: false,
                notes: None,
                change,
                source,
                parent,
            },
            document: document.clone(),
        };

        if let Err(err) = self.store.put(&record) {
            warn!(error = %err, "capture: put failed");
            self.notify(NoticeKind::Error, "Couldn't save snapshot", Some(err.to_string()), now);
            return None;
        }
        info!(snapshot = %id, change = ?change, "captured snapshot");

        // Prune while the swap pointer still marks the active lineage.
        self.prune_pool(source, now);

        self.session.seq += 1;
        self.session.last_hash = Some(hash);
        self.session.last_document = Some(document);
        self.session.last_id = Some(id.clone());
        // A new capture supersedes the swap bookmarks.
        self.session.swapped_to = None;
        self.session.pre_swap_current = None;
        Some(id)
    }

    /// Applies the retention policy for one pool, deleting the planned
    /// overflow record by record.
    fn prune_pool(&mut self, pool: CaptureSource, now: Instant) {
        let cap = match pool {
            CaptureSource::Interactive => self.config.interactive_cap,
            CaptureSource::Programmatic => self.config.programmatic_cap,
        };
        let metas = match self.store.list(self.session.collection()) {
            Ok(metas) => metas,
            Err(err) => {
                warn!(error = %err, "prune: list failed");
                self.notify(NoticeKind::Error, "Couldn't prune history", Some(err.to_string()), now);
                return;
            }
        };
        let tree = SnapshotTree::build(metas);
        let plan = plan_prune(&tree, self.session.swapped_to.as_ref(), cap, pool);
        for id in &plan.delete {
            if let Err(err) = self.store.delete(self.session.collection(), id) {
                warn!(error = %err, snapshot = %id, "prune: delete failed");
                self.notify(NoticeKind::Error, "Couldn't prune snapshot", Some(err.to_string()), now);
            }
        }
        if !plan.delete.is_empty() {
            info!(pruned = plan.delete.len(), pool = ?pool, "retention pruned");
        }
    }

    fn notify(&mut self, kind: NoticeKind, title: &str, body: Option<String>, now: Instant) {
        self.notices.push(kind, title, body, now);
    }
}
