// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change classification between consecutive captures.
//!
//! [`classify`] compares the previous and current document and produces a
//! single-label summary of what kind of edit occurred. It is pure,
//! deterministic, and total: absent optional sub-fields compare as empty
//! and never panic.

use serde::{Deserialize, Serialize};

use crate::doc::WorkflowDoc;

/// Single-label summary of what changed between two consecutive captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// First capture of a collection (no previous document).
    Initial,
    /// Current document has more nodes than the previous one.
    NodeAdded,
    /// Current document has fewer nodes.
    NodeRemoved,
    /// Only the link list changed.
    ConnectionChanged,
    /// Only node widget values changed.
    ParamChanged,
    /// Only node positions changed.
    Moved,
    /// Several kinds of change at once, or same-count node replacement.
    Mixed,
    /// Nothing the classifier inspects changed (e.g. opaque-extra edits).
    Unknown,
}

impl ChangeKind {
    /// Short lowercase description, used for auto-generated capture labels.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::NodeAdded => "node added",
            Self::NodeRemoved => "node removed",
            Self::ConnectionChanged => "connection changed",
            Self::ParamChanged => "params changed",
            Self::Moved => "moved",
            Self::Mixed => "mixed changes",
            Self::Unknown => "edited",
        }
    }
}

const LINKS: u8 = 0b001;
const PARAMS: u8 = 0b010;
const MOVED: u8 = 0b100;
const ALL: u8 = LINKS | PARAMS | MOVED;

/// Classifies the edit between `previous` and `current`.
///
/// `None` for `previous` means this is the first capture (`Initial`).
/// Node-count changes win outright; same-count membership changes are
/// `Mixed`; otherwise three independent predicates (links, params,
/// positions) are OR'd into a mask and collapsed to a label.
#[must_use]
pub fn classify(previous: Option<&WorkflowDoc>, current: &WorkflowDoc) -> ChangeKind {
    let Some(previous) = previous else {
        return ChangeKind::Initial;
    };

    let prev_ids = previous.node_ids();
    let curr_ids = current.node_ids();
    match curr_ids.len().cmp(&prev_ids.len()) {
        std::cmp::Ordering::Greater => return ChangeKind::NodeAdded,
        std::cmp::Ordering::Less => return ChangeKind::NodeRemoved,
        std::cmp::Ordering::Equal => {}
    }
    if prev_ids != curr_ids {
        // Same count, different membership: a node was swapped out.
        return ChangeKind::Mixed;
    }

    let mut mask = 0u8;
    if links_changed(previous, current) {
        mask |= LINKS;
    }
    for id in &curr_ids {
        if mask == ALL {
            break;
        }
        let (Some(before), Some(after)) = (previous.node(*id), current.node(*id)) else {
            continue;
        };
        if mask & PARAMS == 0 && before.values != after.values {
            mask |= PARAMS;
        }
        if mask & MOVED == 0 && before.pos != after.pos {
            mask |= MOVED;
        }
    }

    match mask {
        0 => ChangeKind::Unknown,
        LINKS => ChangeKind::ConnectionChanged,
        PARAMS => ChangeKind::ParamChanged,
        MOVED => ChangeKind::Moved,
        _ => ChangeKind::Mixed,
    }
}

/// Ordered link-list inequality: length first, then a cheap endpoint
/// spot-check, then full equality only when the spot-check is clean
/// (catches wire-type-only edits).
fn links_changed(previous: &WorkflowDoc, current: &WorkflowDoc) -> bool {
    if previous.links.len() != current.links.len() {
        return true;
    }
    let spot_differs = previous.links.iter().zip(&current.links).any(|(a, b)| {
        a.id != b.id
            || a.from_node != b.from_node
            || a.from_slot != b.from_slot
            || a.to_node != b.to_node
            || a.to_slot != b.to_slot
    });
    if spot_differs {
        return true;
    }
    previous.links != current.links
}
