// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural diff between two workflow documents.
//!
//! [`diff`] is directional (`base -> target`), deterministic, and produces
//! an empty [`GraphDiff`] when both sides are the same document. Node
//! identity is the node id; link identity is the link id, so a link that
//! was removed and a structurally identical one re-added reports as
//! remove+add, never as unchanged.
//!
//! Output ordering is canonical: added/removed/modified entries ascend by
//! id, field changes follow a fixed field order, and property changes
//! ascend by key. Rendering layers may truncate values for display via
//! [`preview`]; truncation never participates in equality.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::doc::{LinkId, NodeId, WorkflowDoc, WorkflowLink, WorkflowNode};

/// Maximum characters [`preview`] emits before eliding.
const PREVIEW_MAX: usize = 120;

/// One field-level difference on a node present in both documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "field")]
pub enum FieldChange {
    /// Canvas position moved.
    Position {
        /// Position in the base document.
        from: [f64; 2],
        /// Position in the target document.
        to: [f64; 2],
    },
    /// Canvas size changed.
    Size {
        /// Size in the base document.
        from: Option<[f64; 2]>,
        /// Size in the target document.
        to: Option<[f64; 2]>,
    },
    /// Title changed.
    Title {
        /// Title in the base document.
        from: Option<String>,
        /// Title in the target document.
        to: Option<String>,
    },
    /// Execution mode changed.
    Mode {
        /// Mode in the base document.
        from: Option<i64>,
        /// Mode in the target document.
        to: Option<i64>,
    },
    /// Ordered widget value changed at one index. Length mismatches
    /// produce entries with `None` on the missing side.
    Value {
        /// Index into the ordered value list.
        index: usize,
        /// Value in the base document, if present at this index.
        from: Option<Value>,
        /// Value in the target document, if present at this index.
        to: Option<Value>,
    },
    /// Keyed property changed. The key set is the union of both sides.
    Prop {
        /// Property key.
        key: String,
        /// Value in the base document, if the key exists there.
        from: Option<Value>,
        /// Value in the target document, if the key exists there.
        to: Option<Value>,
    },
}

/// All field-level changes for one node present in both documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeModification {
    /// Node identifier.
    pub id: NodeId,
    /// Operator name (from the target side; unchanged operators are the
    /// common case, and a changed one also appears as a `Prop`-level or
    /// membership difference upstream).
    pub op: String,
    /// Non-empty list of differing fields.
    pub changes: Vec<FieldChange>,
}

/// Count summary of a [`GraphDiff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiffSummary {
    /// Nodes present only in the target.
    pub nodes_added: usize,
    /// Nodes present only in the base.
    pub nodes_removed: usize,
    /// Nodes present in both with at least one differing field.
    pub nodes_modified: usize,
    /// Links present only in the target.
    pub links_added: usize,
    /// Links present only in the base.
    pub links_removed: usize,
}

/// Structural diff from a base document to a target document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphDiff {
    /// Nodes present only in the target, ascending by id.
    pub added_nodes: Vec<WorkflowNode>,
    /// Nodes present only in the base, ascending by id.
    pub removed_nodes: Vec<WorkflowNode>,
    /// Nodes present in both with differing fields, ascending by id.
    pub modified_nodes: Vec<NodeModification>,
    /// Links present only in the target, ascending by id.
    pub added_links: Vec<WorkflowLink>,
    /// Links present only in the base, ascending by id.
    pub removed_links: Vec<WorkflowLink>,
    /// Count summary.
    pub summary: DiffSummary,
}

impl GraphDiff {
    /// True when nothing differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.added_links.is_empty()
            && self.removed_links.is_empty()
    }
}

/// Computes the structural diff from `base` to `target`.
#[must_use]
pub fn diff(base: &WorkflowDoc, target: &WorkflowDoc) -> GraphDiff {
    let base_nodes: BTreeMap<NodeId, &WorkflowNode> =
        base.nodes.iter().map(|n| (n.id, n)).collect();
    let target_nodes: BTreeMap<NodeId, &WorkflowNode> =
        target.nodes.iter().map(|n| (n.id, n)).collect();

    let added_nodes: Vec<WorkflowNode> = target_nodes
        .iter()
        .filter(|(id, _)| !base_nodes.contains_key(id))
        .map(|(_, n)| (*n).clone())
        .collect();
    let removed_nodes: Vec<WorkflowNode> = base_nodes
        .iter()
        .filter(|(id, _)| !target_nodes.contains_key(id))
        .map(|(_, n)| (*n).clone())
        .collect();

    let mut modified_nodes = Vec::new();
    for (id, before) in &base_nodes {
        let Some(after) = target_nodes.get(id) else {
            continue;
        };
        let changes = node_changes(before, after);
        if !changes.is_empty() {
            modified_nodes.push(NodeModification {
                id: *id,
                op: after.op.clone(),
                changes,
            });
        }
    }

    let base_links: BTreeMap<LinkId, &WorkflowLink> =
        base.links.iter().map(|l| (l.id, l)).collect();
    let target_links: BTreeMap<LinkId, &WorkflowLink> =
        target.links.iter().map(|l| (l.id, l)).collect();
    let added_links: Vec<WorkflowLink> = target_links
        .iter()
        .filter(|(id, _)| !base_links.contains_key(id))
        .map(|(_, l)| (*l).clone())
        .collect();
    let removed_links: Vec<WorkflowLink> = base_links
        .iter()
        .filter(|(id, _)| !target_links.contains_key(id))
        .map(|(_, l)| (*l).clone())
        .collect();

    let summary = DiffSummary {
        nodes_added: added_nodes.len(),
        nodes_removed: removed_nodes.len(),
        nodes_modified: modified_nodes.len(),
        links_added: added_links.len(),
        links_removed: removed_links.len(),
    };

    GraphDiff {
        added_nodes,
        removed_nodes,
        modified_nodes,
        added_links,
        removed_links,
        summary,
    }
}

/// Field-level changes for one node present on both sides.
fn node_changes(before: &WorkflowNode, after: &WorkflowNode) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if before.pos != after.pos {
        changes.push(FieldChange::Position {
            from: before.pos,
            to: after.pos,
        });
    }
    if before.size != after.size {
        changes.push(FieldChange::Size {
            from: before.size,
            to: after.size,
        });
    }
    if before.title != after.title {
        changes.push(FieldChange::Title {
            from: before.title.clone(),
            to: after.title.clone(),
        });
    }
    if before.mode != after.mode {
        changes.push(FieldChange::Mode {
            from: before.mode,
            to: after.mode,
        });
    }
    let value_len = before.values.len().max(after.values.len());
    for index in 0..value_len {
        let from = before.values.get(index);
        let to = after.values.get(index);
        if from != to {
            changes.push(FieldChange::Value {
                index,
                from: from.cloned(),
                to: to.cloned(),
            });
        }
    }
    let keys: BTreeSet<&String> = before.props.keys().chain(after.props.keys()).collect();
    for key in keys {
        let from = before.props.get(key);
        let to = after.props.get(key);
        if from != to {
            changes.push(FieldChange::Prop {
                key: key.clone(),
                from: from.cloned(),
                to: to.cloned(),
            });
        }
    }
    changes
}

/// Render-friendly preview of an opaque value.
///
/// Composite values serialize to canonical JSON text (object keys sorted);
/// long previews elide with `…`. Display-only — equality always compares
/// the full values.
#[must_use]
pub fn preview(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= PREVIEW_MAX {
        return text;
    }
    let mut out: String = text.chars().take(PREVIEW_MAX).collect();
    out.push('…');
    out
}
