//! In-memory primitive file store.
//!
//! The reference [`FileStore`] implementation: a `BTreeMap` of records plus
//! a blob table behind one reader-writer lock. Key-addressed reads are
//! always served from the live map; directory queries go through a separate
//! *query index* so the eventual-consistency contract of `list_files` can
//! be exercised deliberately.
//!
//! With [`ConsistencyPolicy::Strong`] (the default) every write indexes
//! immediately and `list_files` sees everything. With
//! [`ConsistencyPolicy::Eventual`] new paths stay invisible to listings
//! until [`MemoryFileStore::sync_queries`] promotes them — the in-process
//! equivalent of a datastore whose global queries lag behind key reads.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::model::file::{BlobRef, FileRecord, MetaMap};
use crate::model::types::{FilePath, now_timestamp_iso8601};
use crate::store::{FileStore, WriteRequest};

// ---------------------------------------------------------------------------
// ConsistencyPolicy
// ---------------------------------------------------------------------------

/// How promptly directory queries observe writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsistencyPolicy {
    /// Listings see every completed write.
    #[default]
    Strong,
    /// Listings see only paths promoted by `sync_queries`.
    Eventual,
}

// ---------------------------------------------------------------------------
// MemoryFileStore
// ---------------------------------------------------------------------------

/// In-memory [`FileStore`].
pub struct MemoryFileStore {
    inner: RwLock<Inner>,
}

struct Inner {
    files: BTreeMap<FilePath, FileRecord>,
    /// Paths visible to `list_files`.
    indexed: BTreeSet<FilePath>,
    blobs: HashMap<String, String>,
    next_blob: u64,
    policy: ConsistencyPolicy,
}

impl MemoryFileStore {
    /// Create a store with strongly consistent queries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(ConsistencyPolicy::Strong)
    }

    /// Create a store with the given query consistency policy.
    #[must_use]
    pub fn with_policy(policy: ConsistencyPolicy) -> Self {
        Self {
            inner: RwLock::new(Inner {
                files: BTreeMap::new(),
                indexed: BTreeSet::new(),
                blobs: HashMap::new(),
                next_blob: 1,
                policy,
            }),
        }
    }

    /// Promote every stored path into the query index.
    ///
    /// Under `Eventual` this is the only way listings catch up; under
    /// `Strong` it is a no-op.
    pub fn sync_queries(&self) {
        let mut inner = self.inner.write();
        let paths: Vec<FilePath> = inner.files.keys().cloned().collect();
        inner.indexed.extend(paths);
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn upsert(
        &mut self,
        path: &FilePath,
        content: Option<String>,
        blob: Option<BlobRef>,
        meta: Option<&MetaMap>,
        modified_by: Option<&str>,
    ) {
        let now = now_timestamp_iso8601();
        let record = self.files.entry(path.clone()).or_insert_with(|| FileRecord {
            path: path.clone(),
            content: String::new(),
            blob: None,
            meta: MetaMap::new(),
            created: now.clone(),
            modified: now.clone(),
            created_by: modified_by.map(str::to_owned),
            modified_by: None,
        });
        if let Some(blob) = blob {
            record.content = String::new();
            record.blob = Some(blob);
        } else if let Some(content) = content {
            record.content = content;
            record.blob = None;
        }
        if let Some(meta) = meta {
            for (key, value) in meta {
                record.meta.insert(key.clone(), value.clone());
            }
        }
        record.modified = now;
        record.modified_by = modified_by.map(str::to_owned);

        if self.policy == ConsistencyPolicy::Strong {
            self.indexed.insert(path.clone());
        }
    }
}

impl FileStore for MemoryFileStore {
    fn exists(&self, path: &FilePath) -> Result<bool, StoreError> {
        Ok(self.inner.read().files.contains_key(path))
    }

    fn get(&self, paths: &[FilePath]) -> Result<BTreeMap<FilePath, FileRecord>, StoreError> {
        let inner = self.inner.read();
        let mut out = BTreeMap::new();
        for path in paths {
            if let Some(record) = inner.files.get(path) {
                out.insert(path.clone(), record.clone());
            }
        }
        Ok(out)
    }

    fn write(&self, request: WriteRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.upsert(
            &request.path,
            request.content,
            request.blob,
            request.meta.as_ref(),
            request.modified_by.as_deref(),
        );
        Ok(())
    }

    fn touch(
        &self,
        paths: &[FilePath],
        meta: Option<&MetaMap>,
        modified_by: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        for path in paths {
            inner.upsert(path, None, None, meta, modified_by);
        }
        Ok(())
    }

    fn delete(&self, paths: &[FilePath]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        for path in paths {
            inner.files.remove(path);
            inner.indexed.remove(path);
        }
        Ok(())
    }

    fn copy(&self, source: &FilePath, dest: &FilePath) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let Some(record) = inner.files.get(source) else {
            return Err(StoreError::Transient {
                detail: format!("copy source {source} does not exist"),
            });
        };
        let mut copied = record.clone();
        copied.path = dest.clone();
        inner.files.insert(dest.clone(), copied);
        if inner.policy == ConsistencyPolicy::Strong {
            inner.indexed.insert(dest.clone());
        }
        Ok(())
    }

    fn list_files(
        &self,
        dir: &FilePath,
        recursive: bool,
    ) -> Result<Vec<FileRecord>, StoreError> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        for path in &inner.indexed {
            if path.is_within(dir, recursive) {
                // Indexed but deleted paths are simply skipped.
                if let Some(record) = inner.files.get(path) {
                    out.push(record.clone());
                }
            }
        }
        Ok(out)
    }

    fn new_blob(&self, content: &str) -> Result<BlobRef, StoreError> {
        let mut inner = self.inner.write();
        let key = format!("blob-{}", inner.next_blob);
        inner.next_blob += 1;
        inner.blobs.insert(key.clone(), content.to_owned());
        Ok(BlobRef::new(key))
    }

    fn read_blob(&self, blob: &BlobRef) -> Result<String, StoreError> {
        self.inner
            .read()
            .blobs
            .get(blob.as_str())
            .cloned()
            .ok_or_else(|| StoreError::BlobMissing {
                key: blob.as_str().to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> FilePath {
        FilePath::new(s).unwrap()
    }

    #[test]
    fn write_then_get() {
        let store = MemoryFileStore::new();
        store
            .write(WriteRequest::to(path("/a")).content("hello").by("me"))
            .unwrap();
        let files = store.get(&[path("/a")]).unwrap();
        let record = files.get(&path("/a")).unwrap();
        assert_eq!(record.content, "hello");
        assert_eq!(record.created_by.as_deref(), Some("me"));
        assert!(store.exists(&path("/a")).unwrap());
    }

    #[test]
    fn get_skips_missing_paths() {
        let store = MemoryFileStore::new();
        store.write(WriteRequest::to(path("/a")).content("x")).unwrap();
        let files = store.get(&[path("/a"), path("/missing")]).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn metadata_only_write_preserves_content() {
        let store = MemoryFileStore::new();
        store.write(WriteRequest::to(path("/a")).content("keep")).unwrap();
        let mut meta = MetaMap::new();
        meta.insert("color".into(), serde_json::json!("blue"));
        store.write(WriteRequest::to(path("/a")).meta(meta)).unwrap();

        let files = store.get(&[path("/a")]).unwrap();
        let record = files.get(&path("/a")).unwrap();
        assert_eq!(record.content, "keep");
        assert_eq!(record.meta.get("color"), Some(&serde_json::json!("blue")));
    }

    #[test]
    fn blob_write_clears_inline_content() {
        let store = MemoryFileStore::new();
        let blob = store.new_blob("big content").unwrap();
        store.write(WriteRequest::to(path("/a")).content("inline")).unwrap();
        store.write(WriteRequest::to(path("/a")).blob(blob.clone())).unwrap();

        let files = store.get(&[path("/a")]).unwrap();
        let record = files.get(&path("/a")).unwrap();
        assert_eq!(record.content, "");
        assert_eq!(record.blob, Some(blob.clone()));
        assert_eq!(store.read_blob(&blob).unwrap(), "big content");
    }

    #[test]
    fn delete_is_idempotent_and_keeps_blobs() {
        let store = MemoryFileStore::new();
        let blob = store.new_blob("kept").unwrap();
        store.write(WriteRequest::to(path("/a")).blob(blob.clone())).unwrap();
        store.delete(&[path("/a")]).unwrap();
        store.delete(&[path("/a")]).unwrap();
        assert!(!store.exists(&path("/a")).unwrap());
        assert_eq!(store.read_blob(&blob).unwrap(), "kept");
    }

    #[test]
    fn copy_preserves_record() {
        let store = MemoryFileStore::new();
        let mut meta = MetaMap::new();
        meta.insert("k".into(), serde_json::json!(1));
        store
            .write(WriteRequest::to(path("/src")).content("data").meta(meta))
            .unwrap();
        store.copy(&path("/src"), &path("/dst")).unwrap();

        let files = store.get(&[path("/dst")]).unwrap();
        let record = files.get(&path("/dst")).unwrap();
        assert_eq!(record.content, "data");
        assert_eq!(record.meta.get("k"), Some(&serde_json::json!(1)));
        assert_eq!(record.path, path("/dst"));
    }

    #[test]
    fn copy_missing_source_fails() {
        let store = MemoryFileStore::new();
        assert!(store.copy(&path("/nope"), &path("/dst")).is_err());
    }

    #[test]
    fn list_files_recursive_and_direct() {
        let store = MemoryFileStore::new();
        for p in ["/d/a", "/d/b", "/d/sub/c", "/other"] {
            store.write(WriteRequest::to(path(p)).content("x")).unwrap();
        }
        let all = store.list_files(&path("/d"), true).unwrap();
        assert_eq!(all.len(), 3);
        let direct = store.list_files(&path("/d"), false).unwrap();
        assert_eq!(direct.len(), 2);
    }

    #[test]
    fn eventual_listings_lag_until_sync() {
        let store = MemoryFileStore::with_policy(ConsistencyPolicy::Eventual);
        store.write(WriteRequest::to(path("/a")).content("x")).unwrap();

        // Key reads are strong, queries are not.
        assert!(store.exists(&path("/a")).unwrap());
        assert!(store.list_files(&FilePath::root(), true).unwrap().is_empty());

        store.sync_queries();
        assert_eq!(store.list_files(&FilePath::root(), true).unwrap().len(), 1);
    }
}
