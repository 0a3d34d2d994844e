//! Changesets: the unit of consistency over a group of files.
//!
//! A [`Changeset`] is a lazy handle around a stored [`ChangesetRecord`]:
//! constructing one is free, and the record hydrates from the datastore on
//! first access and caches. Handles also carry the client-side *manifest* —
//! the list of paths the client knows it wrote — which unlocks the strongly
//! consistent commit path (the store's directory queries are only
//! eventually consistent, so an enumeration-based commit can miss a write
//! issued moments earlier).
//!
//! [`ChangesetStore`] owns allocation and lookup. Numbers come from the
//! strong counter, so they are globally unique and strictly increasing in
//! allocation order.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::counter::{CHANGESET_COUNTER, StrongCounter};
use crate::datastore::Datastore;
use crate::error::{ChangesetError, Result};
use crate::files::FileService;
use crate::model::file::File;
use crate::model::types::{ChangesetStatus, FilePath, now_timestamp_iso8601};

// ---------------------------------------------------------------------------
// ChangesetRecord
// ---------------------------------------------------------------------------

/// A changeset row as persisted in the datastore.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetRecord {
    /// Globally unique, monotonically allocated number.
    pub num: u64,
    /// Lifecycle status.
    pub status: ChangesetStatus,
    /// ISO 8601 creation stamp.
    pub created: String,
    /// Who allocated the changeset.
    pub created_by: Option<String>,
    /// The sibling in a committed staging/final pair.
    pub linked_changeset_num: Option<u64>,
}

// ---------------------------------------------------------------------------
// Changeset
// ---------------------------------------------------------------------------

/// Client-side record of which paths were written into a staging changeset.
#[derive(Clone, Debug, Default)]
struct Manifest {
    paths: Vec<FilePath>,
    finalized: bool,
}

/// Lazy handle to a changeset.
#[derive(Clone, Debug)]
pub struct Changeset {
    num: u64,
    record: OnceLock<ChangesetRecord>,
    manifest: Manifest,
}

impl Changeset {
    /// Handle to changeset `num`, not yet hydrated.
    #[must_use]
    pub fn new(num: u64) -> Self {
        Self {
            num,
            record: OnceLock::new(),
            manifest: Manifest::default(),
        }
    }

    /// Handle pre-populated with a freshly written record.
    #[must_use]
    pub(crate) fn with_record(record: ChangesetRecord) -> Self {
        let handle = Self::new(record.num);
        let _ = handle.record.set(record);
        handle
    }

    /// The changeset number.
    #[must_use]
    pub fn num(&self) -> u64 {
        self.num
    }

    /// The stored record, hydrating and caching on first access.
    ///
    /// # Errors
    /// [`ChangesetError::NotFound`] if no such changeset was ever allocated.
    pub fn record(&self, ds: &Datastore) -> Result<&ChangesetRecord, ChangesetError> {
        if let Some(record) = self.record.get() {
            return Ok(record);
        }
        let record = ds
            .changeset(self.num)
            .ok_or(ChangesetError::NotFound { num: self.num })?;
        Ok(self.record.get_or_init(|| record))
    }

    /// Lifecycle status.
    ///
    /// # Errors
    /// [`ChangesetError::NotFound`] if the changeset does not exist.
    pub fn status(&self, ds: &Datastore) -> Result<ChangesetStatus, ChangesetError> {
        Ok(self.record(ds)?.status)
    }

    /// Who allocated the changeset.
    ///
    /// # Errors
    /// [`ChangesetError::NotFound`] if the changeset does not exist.
    pub fn created_by(&self, ds: &Datastore) -> Result<Option<String>, ChangesetError> {
        Ok(self.record(ds)?.created_by.clone())
    }

    /// The sibling of a committed pair: staging → final, final → staging.
    ///
    /// # Errors
    /// [`ChangesetError::NotFound`] if the changeset does not exist.
    pub fn linked_changeset(&self, ds: &Datastore) -> Result<Option<Self>, ChangesetError> {
        Ok(self.record(ds)?.linked_changeset_num.map(Self::new))
    }

    /// The changeset number staged files are actually stored under.
    ///
    /// Staged blobs never move on commit, so a `Submitted` final changeset
    /// dereferences to its linked staging number; every other status reads
    /// its own subtree.
    ///
    /// # Errors
    /// [`ChangesetError::NotFound`] if the changeset does not exist.
    pub fn read_num(&self, ds: &Datastore) -> Result<u64, ChangesetError> {
        let record = self.record(ds)?;
        if record.status == ChangesetStatus::Submitted {
            if let Some(linked) = record.linked_changeset_num {
                return Ok(linked);
            }
        }
        Ok(self.num)
    }

    /// Record a path the client wrote into this staging changeset.
    ///
    /// Part of the strongly consistent commit path: associate every written
    /// path, then [`finalize`](Self::finalize_associated_files), then commit
    /// without force.
    pub fn associate_file(&mut self, path: FilePath) {
        if !self.manifest.paths.contains(&path) {
            self.manifest.paths.push(path);
        }
    }

    /// Seal the manifest; the commit path may now rely on it.
    pub fn finalize_associated_files(&mut self) {
        self.manifest.finalized = true;
    }

    /// The sealed manifest, if the client finalized one.
    #[must_use]
    pub fn associated_paths(&self) -> Option<&[FilePath]> {
        self.manifest
            .finalized
            .then_some(self.manifest.paths.as_slice())
    }
}

impl PartialEq for Changeset {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num
    }
}

impl Eq for Changeset {}

// ---------------------------------------------------------------------------
// ChangesetStore
// ---------------------------------------------------------------------------

/// Allocation and lookup of changesets.
#[derive(Clone)]
pub struct ChangesetStore {
    ds: Datastore,
    counter: StrongCounter,
}

impl ChangesetStore {
    /// Create a store over the given datastore and counter.
    #[must_use]
    pub fn new(ds: Datastore, counter: StrongCounter) -> Self {
        Self { ds, counter }
    }

    /// Allocate a new staging changeset in `New` status.
    ///
    /// # Errors
    /// Propagates counter and datastore failures.
    pub fn new_staging(&self, created_by: Option<String>) -> Result<Changeset> {
        self.new_changeset(ChangesetStatus::New, created_by)
    }

    /// Allocate and persist a changeset with the given status.
    pub(crate) fn new_changeset(
        &self,
        status: ChangesetStatus,
        created_by: Option<String>,
    ) -> Result<Changeset> {
        let num = self.counter.increment(CHANGESET_COUNTER)?;
        let record = ChangesetRecord {
            num,
            status,
            created: now_timestamp_iso8601(),
            created_by,
            linked_changeset_num: None,
        };
        let stored = record.clone();
        self.ds.transaction(move |tables| {
            tables.changesets.insert(num, stored);
            Ok(())
        })?;
        Ok(Changeset::with_record(record))
    }

    /// Load the changeset with number `num`, verifying it exists.
    ///
    /// # Errors
    /// [`ChangesetError::NotFound`] if it does not.
    pub fn load(&self, num: u64) -> Result<Changeset> {
        let handle = Changeset::new(num);
        handle.record(&self.ds)?;
        Ok(handle)
    }

    /// The most recently submitted changeset.
    ///
    /// # Errors
    /// [`ChangesetError::NoneSubmitted`] if nothing was ever committed.
    pub fn last_submitted(&self) -> Result<Changeset> {
        self.ds
            .last_submitted()
            .map(Changeset::with_record)
            .ok_or_else(|| ChangesetError::NoneSubmitted.into())
    }

    /// The files of a changeset, keyed by plain path.
    ///
    /// With a sealed manifest this is a strongly consistent multi-get;
    /// otherwise it enumerates the changeset's versioned subtree with an
    /// eventually consistent query. `Submitted` changesets dereference to
    /// their linked staging subtree.
    ///
    /// # Errors
    /// Propagates store and changeset failures.
    pub fn list_files_in_changeset(
        &self,
        files: &FileService,
        cs: &Changeset,
    ) -> Result<BTreeMap<FilePath, File>> {
        if let Some(paths) = cs.associated_paths() {
            return files.get_many(paths, Some(cs));
        }
        let listed = files.list_files(&FilePath::root(), true, Some(cs))?;
        Ok(listed
            .into_iter()
            .map(|file| (file.path().clone(), file))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
