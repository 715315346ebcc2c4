// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Document source port: the host editor seam.
//!
//! The engine never talks to an editor directly. It asks a
//! [`DocumentSource`] for the live document when capturing and hands a
//! stored document back when restoring. `Ok(None)` from
//! [`DocumentSource::serialize_current`] means "nothing to capture right
//! now" — the normal empty-canvas case, never an error.

use thiserror::Error;
use weft_core::WorkflowDoc;

/// Failures the host editor can report.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The editor cannot serve requests right now.
    #[error("host editor unavailable: {0}")]
    Unavailable(String),
    /// The document was rejected by the editor on load.
    #[error("document rejected: {0}")]
    Rejected(String),
}

/// How a restored document should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Replace the live document wholesale (restore/swap).
    Replace,
    /// Load for inspection without disturbing editor-side session state.
    Preview,
}

/// Live-document access, implemented by the host-editor binding.
///
/// Loading a document typically echoes edit notifications back into the
/// engine; the session absorbs those behind its restore lock rather than
/// requiring implementations to suppress them.
pub trait DocumentSource {
    /// Serializes the current live document. `Ok(None)` when there is
    /// nothing to capture (no document open).
    fn serialize_current(&mut self) -> Result<Option<WorkflowDoc>, SourceError>;

    /// Makes `document` the live document.
    fn load(&mut self, document: &WorkflowDoc, mode: LoadMode) -> Result<(), SourceError>;
}
