// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! weft-session: capture orchestration for the Weft snapshot engine.
//!
//! The [`CaptureService`] state machine decides when snapshots are taken
//! (debounce, content dedup, restore locks), wires the pure engine pieces
//! from `weft-core` to a store and a host-editor [`DocumentSource`], and
//! surfaces every collaborator failure on a notice queue instead of
//! failing the session. A tokio [`driver`] loop feeds it real time and
//! events; tests feed it explicit instants.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod capture;
mod config;
/// Tokio event loop around the capture service.
pub mod driver;
mod session;
mod source;

/// Capture orchestrator.
pub use capture::CaptureService;
/// Session configuration (timing windows, retention caps).
pub use config::SessionConfig;
/// Driver events.
pub use driver::SessionEvent;
/// Per-collection session context and timing phase.
pub use session::{EngineSession, Phase};
/// Host-editor seam.
pub use source::{DocumentSource, LoadMode, SourceError};
