// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Derived snapshot tree: arena plus parent/child indexes.
//!
//! The tree is rebuilt on demand from one collection's flat record list and
//! never persisted. Records are held in an arena (id -> metadata) with the
//! parent and children relations as derived index maps, so a deleted parent
//! is a data-absence case (the child becomes a root) rather than a dangling
//! reference.
//!
//! Legacy records — those predating explicit parent links — carry no
//! `parent` and are chained chronologically so an old history renders as a
//! single line instead of N disconnected roots.
//!
//! Malformed input can describe a parent cycle. Building never follows
//! parent pointers, and every traversal here and in the branch module
//! guards with a visited set, so nothing loops; [`SnapshotTree::verify_acyclic`]
//! turns the defense into an assertable invariant for tests.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::record::{SnapshotId, SnapshotMeta};

/// Errors surfaced by tree invariant checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The parent relation reaches an already-visited record.
    #[error("parent cycle through snapshot {0}")]
    CycleDetected(SnapshotId),
    /// The requested record is not part of this tree.
    #[error("unknown snapshot {0}")]
    UnknownSnapshot(SnapshotId),
}

/// Snapshot tree for one collection.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTree {
    /// Arena: id -> metadata.
    metas: BTreeMap<SnapshotId, SnapshotMeta>,
    /// Derived: parent id -> children ids, each list in canonical branch
    /// order (timestamp ascending, id tie-break).
    children: BTreeMap<SnapshotId, Vec<SnapshotId>>,
    /// Derived: child id -> parent id. Includes synthesized legacy links.
    parent: BTreeMap<SnapshotId, SnapshotId>,
    /// Roots in canonical order (timestamp ascending, id tie-break).
    roots: Vec<SnapshotId>,
}

impl SnapshotTree {
    /// Builds the tree from one collection's records.
    ///
    /// Records with a `parent` attach under it when the parent is present
    /// in the input; otherwise they are roots (deleted parents are not an
    /// error). Parent-less records sort chronologically and chain each to
    /// its predecessor.
    #[must_use]
    pub fn build(records: Vec<SnapshotMeta>) -> Self {
        let metas: BTreeMap<SnapshotId, SnapshotMeta> =
            records.into_iter().map(|m| (m.id.clone(), m)).collect();

        let mut legacy: Vec<&SnapshotMeta> = Vec::new();
        let mut linked: Vec<(&SnapshotMeta, &SnapshotId)> = Vec::new();
        for meta in metas.values() {
            match &meta.parent {
                Some(declared) => linked.push((meta, declared)),
                None => legacy.push(meta),
            }
        }
        legacy.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));

        let mut parent: BTreeMap<SnapshotId, SnapshotId> = BTreeMap::new();
        let mut children: BTreeMap<SnapshotId, Vec<SnapshotId>> = BTreeMap::new();
        let mut roots: Vec<SnapshotId> = Vec::new();

        for pair in legacy.windows(2) {
            parent.insert(pair[1].id.clone(), pair[0].id.clone());
            children
                .entry(pair[0].id.clone())
                .or_default()
                .push(pair[1].id.clone());
        }
        if let Some(first) = legacy.first() {
            roots.push(first.id.clone());
        }

        for (meta, declared) in linked {
            if metas.contains_key(declared) {
                parent.insert(meta.id.clone(), declared.clone());
                children
                    .entry(declared.clone())
                    .or_default()
                    .push(meta.id.clone());
            } else {
                roots.push(meta.id.clone());
            }
        }

        let order_key = |id: &SnapshotId| {
            metas
                .get(id)
                .map_or((0, id.clone()), |m| (m.timestamp, id.clone()))
        };
        for list in children.values_mut() {
            list.sort_by_key(|id| order_key(id));
        }
        roots.sort_by_key(|id| order_key(id));

        Self {
            metas,
            children,
            parent,
            roots,
        }
    }

    /// Number of records in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    /// True when the tree holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Metadata for one record.
    #[must_use]
    pub fn meta(&self, id: &SnapshotId) -> Option<&SnapshotMeta> {
        self.metas.get(id)
    }

    /// All records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotMeta> {
        self.metas.values()
    }

    /// Root records in canonical order.
    #[must_use]
    pub fn roots(&self) -> &[SnapshotId] {
        &self.roots
    }

    /// Children of `id` in canonical branch order.
    #[must_use]
    pub fn children_of(&self, id: &SnapshotId) -> &[SnapshotId] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Parent of `id`, including synthesized legacy links.
    #[must_use]
    pub fn parent_of(&self, id: &SnapshotId) -> Option<&SnapshotId> {
        self.parent.get(id)
    }

    /// True when `id` has more than one child (a branch-switch affordance).
    #[must_use]
    pub fn is_fork_point(&self, id: &SnapshotId) -> bool {
        self.children_of(id).len() > 1
    }

    /// All fork-point ids.
    pub fn fork_points(&self) -> impl Iterator<Item = &SnapshotId> {
        self.children
            .iter()
            .filter(|(_, kids)| kids.len() > 1)
            .map(|(id, _)| id)
    }

    /// Strict ancestors of `id`, nearest first. Cycle-guarded: a repeated
    /// id terminates the walk instead of looping.
    #[must_use]
    pub fn ancestors(&self, id: &SnapshotId) -> Vec<SnapshotId> {
        let mut out = Vec::new();
        let mut visited: FxHashSet<SnapshotId> = FxHashSet::default();
        visited.insert(id.clone());
        let mut current = id;
        while let Some(next) = self.parent.get(current) {
            if !visited.insert(next.clone()) {
                break;
            }
            out.push(next.clone());
            current = next;
        }
        out
    }

    /// Checks that the parent relation is acyclic.
    ///
    /// Traversals already terminate on malformed input; this makes the
    /// invariant assertable so tests can require it rather than merely
    /// avoid hanging.
    pub fn verify_acyclic(&self) -> Result<(), TreeError> {
        for start in self.metas.keys() {
            let mut visited: FxHashSet<&SnapshotId> = FxHashSet::default();
            visited.insert(start);
            let mut current = start;
            while let Some(next) = self.parent.get(current) {
                if !visited.insert(next) {
                    return Err(TreeError::CycleDetected(next.clone()));
                }
                current = next;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ChangeKind;
    use crate::record::{CaptureSource, CollectionKey};

    fn meta(id: &str, timestamp: u64, parent: Option<&str>) -> SnapshotMeta {
        SnapshotMeta {
            id: SnapshotId::new(id),
            collection: CollectionKey::new("flow.json"),
            timestamp,
            label: id.to_owned(),
            element_count: 1,
            locked: false,
            notes: None,
            change: ChangeKind::Unknown,
            source: CaptureSource::Interactive,
            parent: parent.map(SnapshotId::new),
        }
    }

    #[test]
    fn legacy_records_chain_chronologically() {
        let tree = SnapshotTree::build(vec![
            meta("b", 2, None),
            meta("c", 3, None),
            meta("a", 1, None),
        ]);
        assert_eq!(tree.roots(), [SnapshotId::new("a")]);
        assert_eq!(tree.children_of(&SnapshotId::new("a")), [SnapshotId::new("b")]);
        assert_eq!(tree.children_of(&SnapshotId::new("b")), [SnapshotId::new("c")]);
        assert!(tree.children_of(&SnapshotId::new("c")).is_empty());
        assert!(tree.verify_acyclic().is_ok());
    }

    #[test]
    fn missing_parent_becomes_root() {
        let tree = SnapshotTree::build(vec![meta("a", 1, None), meta("b", 2, Some("gone"))]);
        assert_eq!(tree.roots().len(), 2);
        assert!(tree.parent_of(&SnapshotId::new("b")).is_none());
    }

    #[test]
    fn children_sort_by_timestamp() {
        let tree = SnapshotTree::build(vec![
            meta("root", 1, None),
            meta("late", 9, Some("root")),
            meta("early", 2, Some("root")),
        ]);
        assert_eq!(
            tree.children_of(&SnapshotId::new("root")),
            [SnapshotId::new("early"), SnapshotId::new("late")]
        );
        assert!(tree.is_fork_point(&SnapshotId::new("root")));
    }

    #[test]
    fn ancestors_walk_to_root() {
        let tree = SnapshotTree::build(vec![
            meta("a", 1, None),
            meta("b", 2, Some("a")),
            meta("c", 3, Some("b")),
        ]);
        assert_eq!(
            tree.ancestors(&SnapshotId::new("c")),
            [SnapshotId::new("b"), SnapshotId::new("a")]
        );
        assert!(tree.ancestors(&SnapshotId::new("a")).is_empty());
    }

    #[test]
    fn self_parent_terminates_and_is_detectable() {
        let tree = SnapshotTree::build(vec![meta("a", 1, Some("a"))]);
        assert!(tree.ancestors(&SnapshotId::new("a")).is_empty());
        assert_eq!(
            tree.verify_acyclic(),
            Err(TreeError::CycleDetected(SnapshotId::new("a")))
        );
    }

    #[test]
    fn two_cycle_terminates_and_is_detectable() {
        let tree = SnapshotTree::build(vec![meta("a", 1, Some("b")), meta("b", 2, Some("a"))]);
        // Both walks terminate despite the loop.
        assert_eq!(tree.ancestors(&SnapshotId::new("a")).len(), 1);
        assert!(matches!(
            tree.verify_acyclic(),
            Err(TreeError::CycleDetected(_))
        ));
    }
}
