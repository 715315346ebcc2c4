// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Branch navigation over a snapshot tree.
//!
//! A fork point offers a choice of children; [`BranchSelection`] records
//! the chosen child index per fork (plus a synthetic root selector) and
//! [`display_path`] resolves the single linear path those choices produce.
//! Indices are clamped on read, not validated on write, so a selection
//! made against an older tree stays usable after deletions.
//!
//! The selection lives in session memory only, keyed by collection, and is
//! dropped wholesale when the user switches collections.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::record::SnapshotId;
use crate::tree::{SnapshotTree, TreeError};

/// Key addressing one choice point in the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ForkKey {
    /// The synthetic selector over multiple roots.
    Root,
    /// A fork-point record.
    Record(SnapshotId),
}

/// Chosen child index per fork point.
#[derive(Debug, Clone, Default)]
pub struct BranchSelection {
    selected: BTreeMap<ForkKey, usize>,
}

impl BranchSelection {
    /// Empty selection: index 0 everywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a choice. Stale indices are tolerated and clamped on read.
    pub fn choose(&mut self, key: ForkKey, index: usize) {
        self.selected.insert(key, index);
    }

    /// Stored choice for `key`, defaulting to 0.
    #[must_use]
    pub fn index_for(&self, key: &ForkKey) -> usize {
        self.selected.get(key).copied().unwrap_or(0)
    }

    /// Drops every stored choice.
    pub fn clear(&mut self) {
        self.selected.clear();
    }
}

/// Resolves the active linear path (root first, tip last).
///
/// Starts at the selected root and repeatedly takes the selected child
/// (default 0, clamped into range) until a leaf. Guarded by a visited set
/// so malformed child relations cannot loop.
#[must_use]
pub fn display_path(tree: &SnapshotTree, selection: &BranchSelection) -> Vec<SnapshotId> {
    let roots = tree.roots();
    if roots.is_empty() {
        return Vec::new();
    }
    let root_index = selection.index_for(&ForkKey::Root).min(roots.len() - 1);
    let mut current = roots[root_index].clone();

    let mut path = vec![current.clone()];
    let mut visited: FxHashSet<SnapshotId> = FxHashSet::default();
    visited.insert(current.clone());

    loop {
        let kids = tree.children_of(&current);
        if kids.is_empty() {
            break;
        }
        let index = selection
            .index_for(&ForkKey::Record(current.clone()))
            .min(kids.len() - 1);
        let next = kids[index].clone();
        if !visited.insert(next.clone()) {
            break;
        }
        path.push(next.clone());
        current = next;
    }
    path
}

/// Rewrites `selection` so the active path passes through `target`.
///
/// Walks parent links from `target` up to a root (visited-set guarded),
/// then sets the child index at every fork along that path, plus the root
/// selector when several roots exist.
pub fn select_branch_containing(
    tree: &SnapshotTree,
    target: &SnapshotId,
    selection: &mut BranchSelection,
) -> Result<(), TreeError> {
    if tree.meta(target).is_none() {
        return Err(TreeError::UnknownSnapshot(target.clone()));
    }

    let mut chain = vec![target.clone()];
    let mut visited: FxHashSet<SnapshotId> = FxHashSet::default();
    visited.insert(target.clone());
    let mut current = target.clone();
    while let Some(parent) = tree.parent_of(&current) {
        if !visited.insert(parent.clone()) {
            break;
        }
        chain.push(parent.clone());
        current = parent.clone();
    }
    chain.reverse();

    if tree.roots().len() > 1 {
        if let Some(position) = tree.roots().iter().position(|r| r == &chain[0]) {
            selection.choose(ForkKey::Root, position);
        }
    }
    for pair in chain.windows(2) {
        let kids = tree.children_of(&pair[0]);
        if kids.len() > 1 {
            if let Some(index) = kids.iter().position(|k| k == &pair[1]) {
                selection.choose(ForkKey::Record(pair[0].clone()), index);
            }
        }
    }
    Ok(())
}
