// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Workflow document model shared across Weft tools.
//!
//! A workflow document is a node-graph as the host editor serializes it:
//! an ordered node list, an ordered link list, and an opaque remainder that
//! rides along untouched (canvas transform, editor extras). The engine only
//! inspects the fields the classifier and diff need; everything else is
//! preserved byte-for-byte through capture and restore.
//!
//! Determinism contract
//! - [`WorkflowDoc::content_hash`] is a BLAKE3 digest over a canonical byte
//!   stream: nodes sorted by ascending node id, links sorted by ascending
//!   link id, CBOR-encoded. Two documents that differ only in list order
//!   hash identically.
//! - Opaque values are `serde_json::Value`; its object maps iterate in
//!   sorted key order, so value comparison and encoding are stable.

use std::collections::{BTreeMap, BTreeSet};

use ciborium::ser::into_writer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Blake3 (or equivalent) content hash (32 bytes).
pub type Hash32 = [u8; 32];
/// Editor-assigned node identifier.
pub type NodeId = u64;
/// Editor-assigned link identifier.
pub type LinkId = u64;

fn default_pos() -> [f64; 2] {
    [0.0, 0.0]
}

/// One node of a workflow graph.
///
/// Optional sub-fields are tolerated as absent on deserialization; the
/// engine treats a missing list or map as empty and never panics on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Node identifier, unique within a document.
    pub id: NodeId,
    /// Operator (node type) name.
    pub op: String,
    /// User-visible title, when it differs from the operator default.
    #[serde(default)]
    pub title: Option<String>,
    /// Canvas position (x, y).
    #[serde(default = "default_pos")]
    pub pos: [f64; 2],
    /// Canvas size (width, height), when the editor recorded one.
    #[serde(default)]
    pub size: Option<[f64; 2]>,
    /// Execution mode flag (e.g. muted/bypassed), editor-defined.
    #[serde(default)]
    pub mode: Option<i64>,
    /// Ordered widget values. Compared entry-wise by the classifier/diff.
    #[serde(default)]
    pub values: Vec<Value>,
    /// Keyed node properties. Compared key-wise by the diff.
    #[serde(default)]
    pub props: BTreeMap<String, Value>,
}

/// One directed link of a workflow graph.
///
/// Link identity is the link id, not the endpoint tuple: a link that is
/// removed and a structurally identical one re-added are distinct links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowLink {
    /// Link identifier, unique within a document.
    pub id: LinkId,
    /// Source node id.
    pub from_node: NodeId,
    /// Source output slot.
    pub from_slot: i64,
    /// Destination node id.
    pub to_node: NodeId,
    /// Destination input slot.
    pub to_slot: i64,
    /// Wire type label, when the editor records one.
    #[serde(default)]
    pub ty: Option<String>,
}

/// Full workflow document payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowDoc {
    /// All nodes, in editor order.
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    /// All links, in editor order.
    #[serde(default)]
    pub links: Vec<WorkflowLink>,
    /// Opaque editor payload preserved through capture/restore.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl WorkflowDoc {
    /// True when the document has no nodes.
    ///
    /// Empty documents are never captured and never restored; this is the
    /// shape check behind both policies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Set of node ids present in the document.
    #[must_use]
    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Looks up a node by id. Linear scan; documents are editor-sized.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Canonical serialization (nodes and links sorted by id) for hashing.
    #[must_use]
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut doc = self.clone();
        doc.nodes.sort_by_key(|n| n.id);
        doc.links.sort_by_key(|l| l.id);
        let mut bytes = Vec::new();
        into_writer(&doc, &mut bytes).expect("canonical serialize");
        bytes
    }

    /// BLAKE3 hash of the canonical form. Used for capture dedup.
    #[must_use]
    pub fn content_hash(&self) -> Hash32 {
        blake3::hash(&self.to_canonical_bytes()).into()
    }
}
