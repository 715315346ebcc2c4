// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Retention planning: which snapshots a capped pool should give up.
//!
//! Each capture source ([`CaptureSource`]) forms an independent retention
//! pool with its own cap. A plan never touches the protected set: the
//! swapped-to snapshot and its ancestors (the history a user is actively
//! viewing), every fork point (deleting one silently collapses a branch
//! choice), and every locked record. Within the remaining candidates the
//! oldest overflow is marked for deletion.
//!
//! Planning is pure; the session applies a plan through the store and the
//! next plan over the resulting tree is empty (pruning is idempotent).

use std::collections::BTreeSet;

use crate::record::{CaptureSource, SnapshotId};
use crate::tree::SnapshotTree;

/// Outcome of retention planning for one pool.
#[derive(Debug, Clone, Default)]
pub struct PrunePlan {
    /// Ids to delete, oldest first.
    pub delete: Vec<SnapshotId>,
    /// Ids that were off-limits for this plan.
    pub protected: BTreeSet<SnapshotId>,
}

impl PrunePlan {
    /// True when nothing is marked for deletion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
    }
}

/// Computes the protected-id set.
///
/// `active` is the swapped-to snapshot while a restore is in effect (not
/// the newest capture — protecting the newest capture's ancestry would
/// make every linear history unprunable). The set is the union of the
/// active record, its strict ancestors, all fork points, and all locked
/// records.
#[must_use]
pub fn protected_set(tree: &SnapshotTree, active: Option<&SnapshotId>) -> BTreeSet<SnapshotId> {
    let mut protected: BTreeSet<SnapshotId> = tree.fork_points().cloned().collect();
    for meta in tree.iter() {
        if meta.locked {
            protected.insert(meta.id.clone());
        }
    }
    if let Some(active) = active {
        protected.insert(active.clone());
        protected.extend(tree.ancestors(active));
    }
    protected
}

/// Plans a prune of the `pool` down to `cap` disposable records.
///
/// Candidates are pool members that are neither protected nor locked,
/// sorted timestamp-ascending; the oldest `candidates - cap` are marked.
#[must_use]
pub fn plan_prune(
    tree: &SnapshotTree,
    active: Option<&SnapshotId>,
    cap: usize,
    pool: CaptureSource,
) -> PrunePlan {
    let protected = protected_set(tree, active);
    let mut candidates: Vec<_> = tree
        .iter()
        .filter(|m| m.source == pool && !m.locked && !protected.contains(&m.id))
        .collect();
    candidates.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));

    let overflow = candidates.len().saturating_sub(cap);
    let delete = candidates[..overflow].iter().map(|m| m.id.clone()).collect();
    PrunePlan { delete, protected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ChangeKind;
    use crate::record::{CollectionKey, SnapshotMeta};

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

    fn chain(n: u64) -> Vec<SnapshotMeta> {
        (0..n)
            .map(|i| {
                let parent = (i > 0).then(|| format!("s{}", i - 1));
                meta(&format!("s{i}"), i + 1, parent.as_deref())
            })
            .collect()
    }

    #[test]
    fn linear_chain_keeps_newest_cap() {
        let tree = SnapshotTree::build(chain(10));
        let plan = plan_prune(&tree, None, 3, CaptureSource::Interactive);
        assert_eq!(plan.delete.len(), 7);
        // Oldest first; the 3 most recent survive.
        assert_eq!(plan.delete[0], SnapshotId::new("s0"));
        assert!(!plan.delete.contains(&SnapshotId::new("s7")));
        assert!(!plan.delete.contains(&SnapshotId::new("s9")));
    }

    #[test]
    fn second_prune_is_empty() {
        let mut records = chain(10);
        let tree = SnapshotTree::build(records.clone());
        let plan = plan_prune(&tree, None, 3, CaptureSource::Interactive);
        records.retain(|m| !plan.delete.contains(&m.id));
        let pruned_tree = SnapshotTree::build(records);
        assert!(plan_prune(&pruned_tree, None, 3, CaptureSource::Interactive).is_empty());
    }

    #[test]
    fn fork_points_survive_any_cap() {
        let tree = SnapshotTree::build(vec![
            meta("r", 1, None),
            meta("a", 2, Some("r")),
            meta("b", 3, Some("r")),
        ]);
        for cap in 0..3 {
            let plan = plan_prune(&tree, None, cap, CaptureSource::Interactive);
            assert!(!plan.delete.contains(&SnapshotId::new("r")), "cap {cap}");
        }
    }

    #[test]
    fn active_ancestry_is_protected() {
        let tree = SnapshotTree::build(chain(5));
        let active = SnapshotId::new("s3");
        let plan = plan_prune(&tree, Some(&active), 0, CaptureSource::Interactive);
        // Only s4 is disposable: s3 and everything above it is protected.
        assert_eq!(plan.delete, vec![SnapshotId::new("s4")]);
    }

    #[test]
    fn locked_records_are_never_candidates() {
        let mut records = chain(4);
        records[0].locked = true;
        let tree = SnapshotTree::build(records);
        let plan = plan_prune(&tree, None, 0, CaptureSource::Interactive);
        assert!(!plan.delete.contains(&SnapshotId::new("s0")));
        assert_eq!(plan.delete.len(), 3);
    }

    #[test]
    fn pools_are_independent() {
        let mut records = chain(6);
        for m in records.iter_mut().take(3) {
            m.source = CaptureSource::Programmatic;
        }
        let tree = SnapshotTree::build(records);
        let plan = plan_prune(&tree, None, 0, CaptureSource::Programmatic);
        assert_eq!(plan.delete.len(), 3);
        assert!(plan.delete.iter().all(|id| {
            tree.meta(id).map(|m| m.source) == Some(CaptureSource::Programmatic)
        }));
    }
}
