// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem adapters for Weft: a durable snapshot store (one JSON file
//! per record under hashed per-collection directories) and a config store
//! under the platform config directory.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod config;
mod snapshots;

/// Filesystem-backed `ConfigStore`.
pub use config::FsConfigStore;
/// Filesystem-backed `SnapshotStore`.
pub use snapshots::FsSnapshotStore;
