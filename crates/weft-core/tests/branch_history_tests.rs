// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! History-level tests across tree building, branch navigation, and
//! retention planning: the invariants a presentation layer relies on when
//! it renders the timeline and offers branch switches.

use weft_core::{
    classify, display_path, plan_prune, select_branch_containing, BranchSelection, CaptureSource,
    ChangeKind, CollectionKey, SnapshotId, SnapshotMeta, SnapshotTree,
};

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

/// Legacy histories (no parent links at all) must render as a single line.
#[test]
fn legacy_history_renders_as_one_line() {
    let tree = SnapshotTree::build(vec![
        meta("c", 3, None),
        meta("a", 1, None),
        meta("b", 2, None),
    ]);
    assert_eq!(tree.roots().len(), 1);
    let path = display_path(&tree, &BranchSelection::new());
    assert_eq!(path, ["a", "b", "c"].map(SnapshotId::new).to_vec());
}

/// A mixed history: legacy prefix chained, linked records attached, one
/// orphan promoted to root.
#[test]
fn mixed_legacy_and_linked_records() {
    let tree = SnapshotTree::build(vec![
        meta("old1", 1, None),
        meta("old2", 2, None),
        meta("new1", 3, Some("old2")),
        meta("orphan", 4, Some("deleted-long-ago")),
    ]);
    assert_eq!(tree.roots().len(), 2);
    assert_eq!(
        tree.parent_of(&SnapshotId::new("new1")),
        Some(&SnapshotId::new("old2"))
    );
    assert!(tree.parent_of(&SnapshotId::new("orphan")).is_none());
}

/// From any leaf of a multi-fork tree, selecting its branch re-routes the
/// display path to end at that leaf.
#[test]
fn branch_switch_round_trip_from_every_leaf() {
    //      r ── a ── a1
    //        \     \─ a2
    //         \─ b ── b1
    let records = vec![
        meta("r", 1, None),
        meta("a", 2, Some("r")),
        meta("b", 3, Some("r")),
        meta("a1", 4, Some("a")),
        meta("a2", 5, Some("a")),
        meta("b1", 6, Some("b")),
    ];
    let tree = SnapshotTree::build(records);
    for leaf in ["a1", "a2", "b1"] {
        let mut selection = BranchSelection::new();
        select_branch_containing(&tree, &SnapshotId::new(leaf), &mut selection)
            .expect("leaf exists");
        let path = display_path(&tree, &selection);
        assert_eq!(path.last(), Some(&SnapshotId::new(leaf)), "leaf {leaf}");
    }
}

/// Fork points survive pruning even when the cap is zero, so every branch
/// switch the user can see stays valid after retention runs.
#[test]
fn pruning_never_invalidates_branch_switches() {
    let records = vec![
        meta("r", 1, None),
        meta("a", 2, Some("r")),
        meta("b", 3, Some("r")),
        meta("b1", 4, Some("b")),
        meta("b2", 5, Some("b")),
    ];
    let tree = SnapshotTree::build(records.clone());
    let plan = plan_prune(&tree, None, 0, CaptureSource::Interactive);

    let survivors: Vec<SnapshotMeta> = records
        .into_iter()
        .filter(|m| !plan.delete.contains(&m.id))
        .collect();
    let pruned = SnapshotTree::build(survivors);
    // Both fork points are still present.
    assert!(pruned.meta(&SnapshotId::new("r")).is_some());
    assert!(pruned.meta(&SnapshotId::new("b")).is_some());
    assert!(pruned.verify_acyclic().is_ok());
}

/// The swapped-to record and its whole ancestry survive a prune, so the
/// path the user is viewing never loses a step.
#[test]
fn active_path_survives_prune() {
    let records: Vec<SnapshotMeta> = (0..8)
        .map(|i| {
            let parent = (i > 0).then(|| format!("s{}", i - 1));
            meta(&format!("s{i}"), i + 1, parent.as_deref())
        })
        .collect();
    let tree = SnapshotTree::build(records.clone());
    let active = SnapshotId::new("s5");
    let plan = plan_prune(&tree, Some(&active), 0, CaptureSource::Interactive);

    let survivors: Vec<SnapshotMeta> = records
        .into_iter()
        .filter(|m| !plan.delete.contains(&m.id))
        .collect();
    let pruned = SnapshotTree::build(survivors);
    let mut selection = BranchSelection::new();
    select_branch_containing(&pruned, &active, &mut selection).expect("active survives");
    let path = display_path(&pruned, &selection);
    assert_eq!(
        path,
        ["s0", "s1", "s2", "s3", "s4", "s5"].map(SnapshotId::new).to_vec()
    );
}

/// classify(None, _) is Initial no matter what the document looks like.
#[test]
fn first_capture_is_always_initial() {
    let doc = weft_core::WorkflowDoc::default();
    assert_eq!(classify(None, &doc), ChangeKind::Initial);
}
