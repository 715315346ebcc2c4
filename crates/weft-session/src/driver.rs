// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tokio event loop around a [`CaptureService`].
//!
//! The engine is single-threaded and cooperative: every event runs to
//! completion before the next is taken, and store operations are awaited
//! (here: called) sequentially from this one task. The loop sleeps until
//! the service's next deadline, so debounce and restore-guard windows
//! fire without polling.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use weft_core::{CollectionKey, SnapshotId, SnapshotStore, Timestamp};

use crate::capture::CaptureService;
use crate::source::DocumentSource;

/// Events a host binding feeds into the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The live document changed.
    Edit,
    /// Explicit user capture with a label.
    ManualCapture {
        /// User-supplied snapshot name.
        label: String,
    },
    /// Capture fired by a graph-embedded trigger node.
    TriggerCapture {
        /// Trigger-supplied snapshot name.
        label: String,
    },
    /// Swap the live document for a stored snapshot.
    Restore {
        /// Target snapshot.
        id: SnapshotId,
    },
    /// Re-route the displayed branch through a snapshot.
    SelectBranch {
        /// Snapshot the path must pass through.
        id: SnapshotId,
    },
    /// Open another collection (replaces the session context).
    SwitchCollection {
        /// Collection to open.
        key: CollectionKey,
    },
    /// Stop the loop and hand the service back.
    Shutdown,
}

/// Runs the event loop until [`SessionEvent::Shutdown`] (or the channel
/// closes), then returns the service for inspection or reuse.
pub async fn run<S, D>(
    mut service: CaptureService<S, D>,
    mut events: mpsc::Receiver<SessionEvent>,
) -> CaptureService<S, D>
where
    S: SnapshotStore,
    D: DocumentSource,
{
    loop {
        let deadline = service.next_deadline();
        tokio::select! {
            event = events.recv() => {
                let now = Instant::now();
                match event {
                    None | Some(SessionEvent::Shutdown) => break,
                    Some(SessionEvent::Edit) => service.note_edit(now),
                    Some(SessionEvent::ManualCapture { label }) => {
                        let _ = service.capture_manual(&label, now, wall_clock_ms());
                    }
                    Some(SessionEvent::TriggerCapture { label }) => {
                        let _ = service.capture_programmatic(&label, now, wall_clock_ms());
                    }
                    Some(SessionEvent::Restore { id }) => {
                        let _ = service.restore(&id, now, wall_clock_ms());
                    }
                    Some(SessionEvent::SelectBranch { id }) => {
                        let _ = service.select_branch(&id, now);
                    }
                    Some(SessionEvent::SwitchCollection { key }) => {
                        service.switch_collection(key);
                    }
                }
            }
            () = wait_until(deadline) => {
                let _ = service.tick(Instant::now(), wall_clock_ms());
            }
        }
    }
    service
}

/// Sleeps until `deadline`, or forever when nothing is scheduled (the
/// select above still wakes on incoming events).
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}

/// Milliseconds since the Unix epoch, saturating.
fn wall_clock_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
