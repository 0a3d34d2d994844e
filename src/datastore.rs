//! In-memory entity datastore for version-control metadata.
//!
//! Holds the four entity tables the engine owns — changesets, file
//! versions, pointers, and counter rows — behind one mutex. Mutations go
//! through [`Datastore::transaction`], which runs the closure against a
//! copy of the tables and installs the copy only on success: an `Err`
//! return aborts with no partial state visible, which is exactly the
//! atomicity the commit protocol's pointer flip needs.
//!
//! A distributed rendition would back these tables onto a store with
//! cross-entity-group transactions (or a two-phase pre-submit marker
//! scheme); the table shapes and key encodings would carry over unchanged.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::model::types::{ChangesetStatus, FilePath};
use crate::versions::changeset::ChangesetRecord;
use crate::versions::file_version::{self, FileVersionRecord};
use crate::versions::pointer::PointerRecord;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// One sharded counter row.
#[derive(Clone, Debug, Default)]
pub struct CounterRow {
    /// Per-shard counts; the counter's value is their sum.
    pub shards: Vec<u64>,
    /// Round-robin cursor over the shards.
    pub cursor: usize,
}

/// The entity tables.
///
/// All changeset rows share one ancestor by construction (one map), as do
/// all pointer rows — the properties the strongly consistent changeset
/// queries and the atomic multi-pointer flip rely on.
#[derive(Clone, Debug, Default)]
pub struct Tables {
    /// Changeset rows keyed by number.
    pub changesets: BTreeMap<u64, ChangesetRecord>,
    /// File-version rows keyed by `"<changeset_num>:<path>"`.
    pub file_versions: BTreeMap<String, FileVersionRecord>,
    /// Pointer rows keyed by plain path.
    pub pointers: BTreeMap<FilePath, PointerRecord>,
    /// Strong-counter rows keyed by counter name.
    pub counters: HashMap<String, CounterRow>,
}

// ---------------------------------------------------------------------------
// Datastore
// ---------------------------------------------------------------------------

/// Shared handle to the entity tables. Cheap to clone.
#[derive(Clone, Default)]
pub struct Datastore {
    inner: Arc<Mutex<Tables>>,
}

impl Datastore {
    /// Create an empty datastore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the tables transactionally.
    ///
    /// The closure mutates a copy; on `Ok` the copy replaces the live
    /// tables, on `Err` it is discarded. Transactions serialize against
    /// each other, so concurrent commits linearize here.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        let mut copy = guard.clone();
        let out = f(&mut copy)?;
        *guard = copy;
        Ok(out)
    }

    /// Load a changeset row.
    #[must_use]
    pub fn changeset(&self, num: u64) -> Option<ChangesetRecord> {
        self.inner.lock().changesets.get(&num).cloned()
    }

    /// The newest changeset row with `Submitted` status.
    #[must_use]
    pub fn last_submitted(&self) -> Option<ChangesetRecord> {
        self.inner
            .lock()
            .changesets
            .values()
            .rev()
            .find(|record| record.status == ChangesetStatus::Submitted)
            .cloned()
    }

    /// Load a pointer row.
    #[must_use]
    pub fn pointer(&self, path: &FilePath) -> Option<PointerRecord> {
        self.inner.lock().pointers.get(path).cloned()
    }

    /// Load pointer rows for a batch of paths; missing paths are absent.
    #[must_use]
    pub fn pointers(&self, paths: &[FilePath]) -> BTreeMap<FilePath, PointerRecord> {
        let guard = self.inner.lock();
        let mut out = BTreeMap::new();
        for path in paths {
            if let Some(record) = guard.pointers.get(path) {
                out.insert(path.clone(), record.clone());
            }
        }
        out
    }

    /// Load one file-version row.
    #[must_use]
    pub fn file_version(&self, changeset_num: u64, path: &FilePath) -> Option<FileVersionRecord> {
        self.inner
            .lock()
            .file_versions
            .get(&file_version::key(changeset_num, path))
            .cloned()
    }

    /// Revision history of `path`, newest first, up to `limit` rows.
    ///
    /// Ordered by changeset number descending, which equals commit order
    /// restricted to the path.
    #[must_use]
    pub fn file_versions_for_path(&self, path: &FilePath, limit: usize) -> Vec<FileVersionRecord> {
        let guard = self.inner.lock();
        let mut rows: Vec<FileVersionRecord> = guard
            .file_versions
            .values()
            .filter(|record| &record.path == path)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.changeset_num.cmp(&a.changeset_num));
        rows.truncate(limit);
        rows
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
