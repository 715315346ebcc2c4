// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Driver smoke tests: the tokio loop wires real time into the capture
//! state machine. Windows are kept tiny and sleeps generous so these stay
//! robust on slow CI.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use weft_core::{CollectionKey, MemoryStore, WorkflowDoc, WorkflowNode};
use weft_session::driver::{run, SessionEvent};
use weft_session::{CaptureService, DocumentSource, LoadMode, SessionConfig, SourceError};

/// Host-editor stand-in whose live document tests can swap from outside
/// the driver task.
struct SharedSource {
    live: Arc<Mutex<Option<WorkflowDoc>>>,
}

impl DocumentSource for SharedSource {
    fn serialize_current(&mut self) -> Result<Option<WorkflowDoc>, SourceError> {
        Ok(self.live.lock().expect("live lock").clone())
    }

    fn load(&mut self, document: &WorkflowDoc, _mode: LoadMode) -> Result<(), SourceError> {
        *self.live.lock().expect("live lock") = Some(document.clone());
        Ok(())
    }
}

fn doc(x: f64) -> WorkflowDoc {
    WorkflowDoc {
        nodes: vec![WorkflowNode {
            id: 1,
            op: "Op".into(),
            title: None,
            pos: [x, 0.0],
            size: None,
            mode: None,
            values: Vec::new(),
            props: BTreeMap::new(),
        }],
        ..WorkflowDoc::default()
    }
}

#[tokio::test]
async fn driver_debounces_dedupes_and_captures() {
    let live = Arc::new(Mutex::new(Some(doc(0.0))));
    let service = CaptureService::new(
        MemoryStore::new(),
        SharedSource { live: live.clone() },
        SessionConfig {
            debounce_ms: 25,
            restore_guard_ms: 30,
            ..SessionConfig::default()
        },
        CollectionKey::new("flow.json"),
    );
    let (events, rx) = mpsc::channel(16);
    let driver = tokio::spawn(run(service, rx));

    // A burst of edits coalesces into one capture.
    for _ in 0..3 {
        events.send(SessionEvent::Edit).await.expect("send edit");
        sleep(Duration::from_millis(5)).await;
    }
    sleep(Duration::from_millis(150)).await;

    // An edit with unchanged content captures nothing.
    events.send(SessionEvent::Edit).await.expect("send edit");
    sleep(Duration::from_millis(150)).await;

    // A changed document plus a manual capture lands a second record.
    *live.lock().expect("live lock") = Some(doc(42.0));
    events
        .send(SessionEvent::ManualCapture {
            label: "named".into(),
        })
        .await
        .expect("send capture");
    sleep(Duration::from_millis(50)).await;

    events.send(SessionEvent::Shutdown).await.expect("send shutdown");
    let mut service = driver.await.expect("driver join");

    let tree = service.tree(Instant::now());
    assert_eq!(tree.len(), 2);
    let labels: Vec<String> = tree.iter().map(|m| m.label.clone()).collect();
    assert!(labels.contains(&"named".to_owned()));
}

#[tokio::test]
async fn driver_restore_locks_out_echo_edits() {
    let live = Arc::new(Mutex::new(Some(doc(0.0))));
    let mut service = CaptureService::new(
        MemoryStore::new(),
        SharedSource { live: live.clone() },
        SessionConfig {
            debounce_ms: 20,
            restore_guard_ms: 250,
            ..SessionConfig::default()
        },
        CollectionKey::new("flow.json"),
    );

    // Seed two snapshots synchronously before the loop takes over.
    let now = Instant::now();
    let first = service.capture_manual("a", now, 1_000).expect("capture a");
    *live.lock().expect("live lock") = Some(doc(1.0));
    service.capture_manual("b", now, 2_000).expect("capture b");

    let (events, rx) = mpsc::channel(16);
    let driver = tokio::spawn(run(service, rx));

    events
        .send(SessionEvent::Restore { id: first.clone() })
        .await
        .expect("send restore");
    sleep(Duration::from_millis(20)).await;

    // An echo edit with novel content arrives inside the guard window; the
    // lock must absorb it entirely (not merely debounce it).
    *live.lock().expect("live lock") = Some(doc(2.0));
    events.send(SessionEvent::Edit).await.expect("send edit");
    sleep(Duration::from_millis(100)).await;

    events.send(SessionEvent::Shutdown).await.expect("send shutdown");
    let mut service = driver.await.expect("driver join");
    assert_eq!(service.tree(Instant::now()).len(), 2);
    assert_eq!(service.session().swapped_to(), Some(&first));
}
