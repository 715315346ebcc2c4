// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem store tests: durability across reopen, cache coherence,
//! locked preservation, and id hygiene.

use std::collections::BTreeMap;

use tempfile::tempdir;
use weft_core::{
    CaptureSource, ChangeKind, ClearOutcome, CollectionKey, MetaPatch, SnapshotId, SnapshotMeta,
    SnapshotRecord, SnapshotStore, StoreError, WorkflowDoc, WorkflowNode,
};
use weft_store_fs::FsSnapshotStore;

fn record(id: &str, timestamp: u64, locked: bool) -> SnapshotRecord {
    SnapshotRecord {
        meta: SnapshotMeta {
            id: SnapshotId::new(id),
            collection: CollectionKey::new("flows/main.json"),
            timestamp,
            label: id.to_owned(),
            element_count: 1,
            locked,
            notes: None,
            change: ChangeKind::Initial,
            source: CaptureSource::Interactive,
            parent: None,
        },
        document: WorkflowDoc {
            nodes: vec![WorkflowNode {
                id: 1,
                op: "Load".into(),
                title: None,
                pos: [1.0, 2.0],
                size: None,
                mode: None,
                values: vec![serde_json::json!("value")],
                props: BTreeMap::new(),
            }],
            ..WorkflowDoc::default()
        },
    }
}

#[test]
fn records_survive_reopen() {
    let dir = tempdir().expect("tempdir");
    let key = CollectionKey::new("flows/main.json");
    {
        let mut store = FsSnapshotStore::open(dir.path()).expect("open");
        store.put(&record("a", 1, false)).expect("put a");
        store.put(&record("b", 2, false)).expect("put b");
    }
    let mut reopened = FsSnapshotStore::open(dir.path()).expect("reopen");
    let metas = reopened.list(&key).expect("list");
    assert_eq!(metas.len(), 2);
    assert_eq!(metas[0].id, SnapshotId::new("a"));

    let full = reopened.get(&key, &SnapshotId::new("b")).expect("get");
    let full = full.expect("record b present");
    assert_eq!(full.document.nodes.len(), 1);
}

#[test]
fn update_meta_persists_and_updates_cache() {
    let dir = tempdir().expect("tempdir");
    let key = CollectionKey::new("flows/main.json");
    let mut store = FsSnapshotStore::open(dir.path()).expect("open");
    store.put(&record("a", 1, false)).expect("put");

    let patch = MetaPatch {
        label: Some("milestone".into()),
        locked: Some(true),
        ..MetaPatch::default()
    };
    assert!(store.update_meta(&key, &SnapshotId::new("a"), &patch).expect("update"));
    assert_eq!(store.list(&key).expect("list")[0].label, "milestone");

    let mut reopened = FsSnapshotStore::open(dir.path()).expect("reopen");
    let metas = reopened.list(&key).expect("list");
    assert_eq!(metas[0].label, "milestone");
    assert!(metas[0].locked);
}

#[test]
fn delete_all_preserves_locked_records() {
    let dir = tempdir().expect("tempdir");
    let key = CollectionKey::new("flows/main.json");
    let mut store = FsSnapshotStore::open(dir.path()).expect("open");
    store.put(&record("a", 1, false)).expect("put");
    store.put(&record("b", 2, true)).expect("put");
    store.put(&record("c", 3, false)).expect("put");

    let outcome = store.delete_all(&key).expect("clear");
    assert_eq!(outcome, ClearOutcome { deleted: 2, locked_kept: 1 });

    let mut reopened = FsSnapshotStore::open(dir.path()).expect("reopen");
    let metas = reopened.list(&key).expect("list");
    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].id, SnapshotId::new("b"));
}

#[test]
fn deleting_last_record_removes_collection() {
    let dir = tempdir().expect("tempdir");
    let key = CollectionKey::new("flows/main.json");
    let mut store = FsSnapshotStore::open(dir.path()).expect("open");
    store.put(&record("only", 1, false)).expect("put");
    assert_eq!(store.collections().expect("collections").len(), 1);

    store.delete(&key, &SnapshotId::new("only")).expect("delete");
    assert!(store.list(&key).expect("list").is_empty());

    let mut reopened = FsSnapshotStore::open(dir.path()).expect("reopen");
    assert!(reopened.collections().expect("collections").is_empty());
}

#[test]
fn collections_enumerate_original_keys() {
    let dir = tempdir().expect("tempdir");
    let mut store = FsSnapshotStore::open(dir.path()).expect("open");
    store.put(&record("a", 1, false)).expect("put");
    let mut other = record("z", 5, false);
    other.meta.collection = CollectionKey::new("flows/alt.json");
    store.put(&other).expect("put");

    let info = store.collections().expect("collections");
    assert_eq!(info.len(), 2);
    // Key-ascending, original (unhashed) keys.
    assert_eq!(info[0].key, CollectionKey::new("flows/alt.json"));
    assert_eq!(info[1].key, CollectionKey::new("flows/main.json"));
}

#[test]
fn path_escaping_ids_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let mut store = FsSnapshotStore::open(dir.path()).expect("open");
    let mut bad = record("x", 1, false);
    bad.meta.id = SnapshotId::new("../../etc/passwd");
    assert!(matches!(store.put(&bad), Err(StoreError::InvalidId(_))));
}

#[test]
fn corrupt_files_are_skipped_on_list_but_error_on_get() {
    let dir = tempdir().expect("tempdir");
    let key = CollectionKey::new("flows/main.json");
    let mut store = FsSnapshotStore::open(dir.path()).expect("open");
    store.put(&record("good", 1, false)).expect("put");

    // Corrupt a record file behind the store's back.
    let collection_dir = std::fs::read_dir(dir.path())
        .expect("read root")
        .flatten()
        .find(|e| e.path().is_dir())
        .expect("collection dir")
        .path();
    std::fs::write(collection_dir.join("broken.json"), b"{ not json").expect("corrupt");

    let mut reopened = FsSnapshotStore::open(dir.path()).expect("reopen");
    assert_eq!(reopened.list(&key).expect("list").len(), 1);
    assert!(matches!(
        reopened.get(&key, &SnapshotId::new("broken")),
        Err(StoreError::Codec(_))
    ));
}
