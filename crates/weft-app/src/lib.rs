// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ambient application services for Weft tools: config storage port and a
//! user-facing notice queue. The snapshot engine surfaces every
//! collaborator failure through these seams instead of panicking or
//! printing.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

/// Config storage port and typed config service.
pub mod config;
/// Notice queue with TTL and dedupe.
pub mod notify;
