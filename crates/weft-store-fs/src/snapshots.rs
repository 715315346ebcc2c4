// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem snapshot store.
//!
//! Layout: `<root>/<dir>/<id>.json`, one JSON file per record, where
//! `<dir>` is a hashed, filesystem-safe encoding of the collection key
//! (16 bytes of `blake3("collection:" || key)`, hex). A `collection.json`
//! manifest inside each directory records the original key so collections
//! can be enumerated without reversing the hash.
//!
//! A per-collection metadata cache (everything except the document
//! payload) is warmed lazily from disk and kept in sync by every write
//! path; after warm-up only [`FsSnapshotStore::get`] touches a record
//! file. Unreadable files are skipped during warm-up and surface as
//! `Codec` errors only on direct reads.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use weft_core::{
    validate_snapshot_id, ClearOutcome, CollectionInfo, CollectionKey, MetaPatch, SnapshotId,
    SnapshotMeta, SnapshotRecord, SnapshotStore, StoreError,
};

const MANIFEST: &str = "collection.json";

#[derive(serde::Serialize, serde::Deserialize)]
struct Manifest {
    key: String,
}

/// Snapshot store writing one JSON file per record.
pub struct FsSnapshotStore {
    root: PathBuf,
    cache: BTreeMap<CollectionKey, Vec<SnapshotMeta>>,
    warmed: BTreeSet<CollectionKey>,
}

impl FsSnapshotStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            cache: BTreeMap::new(),
            warmed: BTreeSet::new(),
        })
    }

    /// Opens the store at the platform data directory (e.g.,
    /// `~/.local/share/Weft/snapshots`).
    pub fn open_default() -> Result<Self, StoreError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Weft")
            .ok_or_else(|| StoreError::Codec("could not resolve data dir".into()))?;
        Self::open(proj.data_dir().join("snapshots"))
    }

    /// Root directory this store writes under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &CollectionKey) -> PathBuf {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"collection:");
        hasher.update(collection.as_str().as_bytes());
        let digest = hasher.finalize();
        self.root.join(hex::encode(&digest.as_bytes()[..16]))
    }

    fn record_path(&self, collection: &CollectionKey, id: &SnapshotId) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", id.as_str()))
    }

    /// Warms the metadata cache for `collection` if not already loaded.
    fn warm(&mut self, collection: &CollectionKey) {
        if self.warmed.contains(collection) {
            return;
        }
        let dir = self.collection_dir(collection);
        let mut metas: Vec<SnapshotMeta> = Vec::new();
        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json")
                    || path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST)
                {
                    continue;
                }
                // Corrupt or foreign files are skipped, not fatal.
                let Ok(bytes) = fs::read(&path) else { continue };
                let Ok(record) = serde_json::from_slice::<SnapshotRecord>(&bytes) else {
                    continue;
                };
                metas.push(record.meta);
            }
        }
        metas.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        self.cache.insert(collection.clone(), metas);
        self.warmed.insert(collection.clone());
    }

    fn cache_upsert(&mut self, meta: SnapshotMeta) {
        if !self.warmed.contains(&meta.collection) {
            return;
        }
        let entries = self.cache.entry(meta.collection.clone()).or_default();
        entries.retain(|m| m.id != meta.id);
        entries.push(meta);
        entries.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
    }

    fn cache_remove(&mut self, collection: &CollectionKey, id: &SnapshotId) {
        if let Some(entries) = self.cache.get_mut(collection) {
            entries.retain(|m| &m.id != id);
        }
    }

    /// Writes the manifest once per collection directory.
    fn ensure_manifest(&self, dir: &Path, collection: &CollectionKey) -> Result<(), StoreError> {
        let path = dir.join(MANIFEST);
        if path.exists() {
            return Ok(());
        }
        let manifest = Manifest {
            key: collection.as_str().to_owned(),
        };
        let bytes =
            serde_json::to_vec(&manifest).map_err(|e| StoreError::Codec(e.to_string()))?;
        write_atomic(&path, &bytes)?;
        Ok(())
    }

    /// Removes the collection directory once only the manifest is left.
    fn cleanup_dir(&self, dir: &Path) {
        let Ok(entries) = fs::read_dir(dir) else { return };
        let mut leftover = 0usize;
        for entry in entries.flatten() {
            if entry.path().file_name().and_then(|n| n.to_str()) == Some(MANIFEST) {
                continue;
            }
            leftover += 1;
        }
        if leftover == 0 {
            let _ = fs::remove_file(dir.join(MANIFEST));
            let _ = fs::remove_dir(dir);
        }
    }

    fn read_record(&self, path: &Path) -> Result<Option<SnapshotRecord>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(Some(record))
    }

    fn write_record(&self, path: &Path, record: &SnapshotRecord) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(record).map_err(|e| StoreError::Codec(e.to_string()))?;
        write_atomic(path, &bytes)
    }
}

/// Write-then-rename so a reader never observes a half-written record.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl SnapshotStore for FsSnapshotStore {
    fn put(&mut self, record: &SnapshotRecord) -> Result<(), StoreError> {
        validate_snapshot_id(&record.meta.id)?;
        let dir = self.collection_dir(&record.meta.collection);
        fs::create_dir_all(&dir)?;
        self.ensure_manifest(&dir, &record.meta.collection)?;
        let path = self.record_path(&record.meta.collection, &record.meta.id);
        self.write_record(&path, record)?;
        self.cache_upsert(record.meta.clone());
        Ok(())
    }

    fn list(&mut self, collection: &CollectionKey) -> Result<Vec<SnapshotMeta>, StoreError> {
        self.warm(collection);
        Ok(self.cache.get(collection).cloned().unwrap_or_default())
    }

    fn get(
        &mut self,
        collection: &CollectionKey,
        id: &SnapshotId,
    ) -> Result<Option<SnapshotRecord>, StoreError> {
        validate_snapshot_id(id)?;
        self.read_record(&self.record_path(collection, id))
    }

    fn update_meta(
        &mut self,
        collection: &CollectionKey,
        id: &SnapshotId,
        patch: &MetaPatch,
    ) -> Result<bool, StoreError> {
        validate_snapshot_id(id)?;
        let path = self.record_path(collection, id);
        let Some(mut record) = self.read_record(&path)? else {
            return Ok(false);
        };
        patch.apply(&mut record.meta);
        self.write_record(&path, &record)?;
        self.cache_upsert(record.meta);
        Ok(true)
    }

    fn delete(&mut self, collection: &CollectionKey, id: &SnapshotId) -> Result<(), StoreError> {
        validate_snapshot_id(id)?;
        let path = self.record_path(collection, id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::Io(err)),
        }
        self.cache_remove(collection, id);
        self.cleanup_dir(&self.collection_dir(collection));
        Ok(())
    }

    fn delete_all(&mut self, collection: &CollectionKey) -> Result<ClearOutcome, StoreError> {
        self.warm(collection);
        let metas = self.cache.get(collection).cloned().unwrap_or_default();
        let dir = self.collection_dir(collection);
        let mut outcome = ClearOutcome::default();
        let mut kept: Vec<SnapshotMeta> = Vec::new();
        for meta in metas {
            if meta.locked {
                outcome.locked_kept += 1;
                kept.push(meta);
                continue;
            }
            let path = dir.join(format!("{}.json", meta.id.as_str()));
            match fs::remove_file(&path) {
                Ok(()) => outcome.deleted += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(StoreError::Io(err)),
            }
        }
        self.cache.insert(collection.clone(), kept);
        self.cleanup_dir(&dir);
        Ok(outcome)
    }

    fn collections(&mut self) -> Result<Vec<CollectionInfo>, StoreError> {
        let mut keys: Vec<CollectionKey> = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Io(err)),
        };
        for entry in entries.flatten() {
            let manifest_path = entry.path().join(MANIFEST);
            let Ok(bytes) = fs::read(&manifest_path) else { continue };
            let Ok(manifest) = serde_json::from_slice::<Manifest>(&bytes) else {
                continue;
            };
            keys.push(CollectionKey::new(manifest.key));
        }
        keys.sort();

        let mut out = Vec::new();
        for key in keys {
            self.warm(&key);
            let count = self.cache.get(&key).map_or(0, Vec::len);
            if count > 0 {
                out.push(CollectionInfo { key, count });
            }
        }
        Ok(out)
    }
}
