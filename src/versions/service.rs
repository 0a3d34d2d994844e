//! The version-control service: commits, history, and diff.
//!
//! # Commit protocol
//!
//! Committing staging changeset `S` as final changeset `F`:
//!
//! 1. Enumerate the staged files (strongly via a sealed manifest, or
//!    eventually via the directory query when forced). Empty → refuse.
//! 2. Re-verify `S` is still `new`.
//! 3. Allocate `F` in `pre-submit` status. This happens *outside* the
//!    transaction: nested allocation inside it is impossible, so a crash
//!    between here and step 4 leaks a pre-submit tombstone. Tombstones are
//!    harmless and retained forever.
//! 4. In one datastore transaction: flip `S` to `deleted-by-submit` and
//!    `F` to `submitted` (linking them symmetrically), write one
//!    file-version row per staged path, and upsert or remove each path's
//!    pointer. Pointers reference the *staging* number — staged blobs are
//!    never relocated, the staging subtree simply becomes the archive.
//! 5. Return `F`.
//!
//! Readers never observe partial pointer updates: the transaction installs
//! all of step 4 or none of it.

use crate::datastore::Datastore;
use crate::error::{CommitError, FileVersionError, Result};
use crate::files::FileService;
use crate::model::diff::{DiffRun, diff_text};
use crate::model::types::{ChangesetStatus, FilePath, FileStatus, now_timestamp_iso8601};
use crate::versions::changeset::{Changeset, ChangesetStore};
use crate::versions::file_version::{self, FileVersion, FileVersionRecord};
use crate::versions::pointer::PointerRecord;

/// Default cap on history query results.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// A service object providing version-control methods.
#[derive(Clone)]
pub struct VersionControlService {
    ds: Datastore,
    files: FileService,
    changesets: ChangesetStore,
    history_limit: usize,
}

impl VersionControlService {
    /// Assemble the service from its parts.
    #[must_use]
    pub fn new(
        ds: Datastore,
        files: FileService,
        changesets: ChangesetStore,
        history_limit: usize,
    ) -> Self {
        Self {
            ds,
            files,
            changesets,
            history_limit,
        }
    }

    /// The entity datastore.
    #[must_use]
    pub fn datastore(&self) -> &Datastore {
        &self.ds
    }

    /// The hook-dispatching file service.
    #[must_use]
    pub fn files(&self) -> &FileService {
        &self.files
    }

    /// The changeset store.
    #[must_use]
    pub fn changesets(&self) -> &ChangesetStore {
        &self.changesets
    }

    /// Allocate a new staging changeset.
    ///
    /// # Errors
    /// Propagates counter and datastore failures.
    pub fn new_staging_changeset(&self, created_by: Option<String>) -> Result<Changeset> {
        self.changesets.new_staging(created_by)
    }

    /// The most recently submitted changeset.
    ///
    /// # Errors
    /// Fails if nothing was ever committed.
    pub fn last_submitted_changeset(&self) -> Result<Changeset> {
        self.changesets.last_submitted()
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Commit a staging changeset, returning the final changeset.
    ///
    /// `force = false` requires the client to have associated and finalized
    /// a manifest of staged paths, and commits from a strongly consistent
    /// multi-get on it. `force = true` commits from the eventually
    /// consistent directory query instead — a write issued moments before
    /// may be missed.
    ///
    /// # Errors
    /// [`CommitError`] for empty changesets, status violations, a missing
    /// manifest, or a transaction abort. A failed commit leaves a
    /// `pre-submit` tombstone; retry with a fresh commit call.
    pub fn commit(&self, staging: &Changeset, force: bool) -> Result<Changeset> {
        if !force && staging.associated_paths().is_none() {
            return Err(CommitError::ManifestNotFinalized {
                num: staging.num(),
            }
            .into());
        }

        let staged_files = self
            .changesets
            .list_files_in_changeset(&self.files, staging)?;
        if staged_files.is_empty() {
            return Err(CommitError::EmptyChangeset {
                num: staging.num(),
            }
            .into());
        }
        let status = staging.status(&self.ds)?;
        if status != ChangesetStatus::New {
            return Err(CommitError::BadStatus {
                num: staging.num(),
                status,
            }
            .into());
        }

        // Allocation outside the transaction; see module docs for why a
        // leaked pre-submit tombstone is acceptable.
        let final_cs = self
            .changesets
            .new_changeset(ChangesetStatus::PreSubmit, staging.created_by(&self.ds)?)?;
        let staging_num = staging.num();
        let final_num = final_cs.num();
        tracing::info!(
            staging_changeset = staging_num,
            final_changeset = final_num,
            files = staged_files.len(),
            "submitting changeset"
        );

        let created_by = final_cs.created_by(&self.ds)?;
        let now = now_timestamp_iso8601();
        self.ds.transaction(|tables| {
            let staging_rec = tables.changesets.get_mut(&staging_num).ok_or_else(|| {
                CommitError::TransactionAborted {
                    num: staging_num,
                    detail: "staging changeset row vanished".to_owned(),
                }
            })?;
            if staging_rec.status != ChangesetStatus::New {
                return Err(CommitError::BadStatus {
                    num: staging_num,
                    status: staging_rec.status,
                }
                .into());
            }
            staging_rec.status = ChangesetStatus::DeletedBySubmit;
            staging_rec.linked_changeset_num = Some(final_num);

            let final_rec = tables.changesets.get_mut(&final_num).ok_or_else(|| {
                CommitError::TransactionAborted {
                    num: staging_num,
                    detail: "final changeset row vanished".to_owned(),
                }
            })?;
            final_rec.status = ChangesetStatus::Submitted;
            final_rec.linked_changeset_num = Some(staging_num);

            for (path, file) in &staged_files {
                let pointer_exists = tables.pointers.contains_key(path);
                let staged_status = file.status().unwrap_or(FileStatus::Edited);
                let status = match staged_status {
                    FileStatus::Deleted => FileStatus::Deleted,
                    _ if !pointer_exists => FileStatus::Created,
                    _ => FileStatus::Edited,
                };

                tables.file_versions.insert(
                    file_version::key(final_num, path),
                    FileVersionRecord {
                        path: path.clone(),
                        changeset_num: final_num,
                        changeset_created_by: created_by.clone(),
                        created: now.clone(),
                        status,
                    },
                );

                if status == FileStatus::Deleted {
                    tables.pointers.remove(path);
                } else {
                    // The pointer names the staging number: the staged blob
                    // stays where it was written.
                    tables.pointers.insert(
                        path.clone(),
                        PointerRecord {
                            path: path.clone(),
                            changeset_num: staging_num,
                        },
                    );
                }
            }
            Ok(())
        })?;

        tracing::info!(
            staging_changeset = staging_num,
            final_changeset = final_num,
            "submitted changeset"
        );
        self.changesets.load(final_num)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Revision history of `path`, newest first.
    ///
    /// Ordered by changeset number descending; `limit` defaults to the
    /// service's configured history limit.
    #[must_use]
    pub fn file_versions(&self, path: &FilePath, limit: Option<usize>) -> Vec<FileVersion> {
        self.ds
            .file_versions_for_path(path, limit.unwrap_or(self.history_limit))
            .into_iter()
            .map(FileVersion::with_record)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Diff
    // -----------------------------------------------------------------------

    /// Pairwise textual diff between two revisions of a path.
    ///
    /// Each version resolves through its changeset (dereferencing to the
    /// linked staging subtree), so any two committed revisions — including
    /// delete tombstones, whose content is empty — diff cleanly.
    ///
    /// # Errors
    /// [`FileVersionError::NotFound`] if either version's staged file is
    /// missing.
    pub fn generate_diff(
        &self,
        before: &FileVersion,
        after: &FileVersion,
    ) -> Result<Vec<DiffRun>> {
        let before_file = self
            .files
            .get(before.path(), Some(before.changeset()))?
            .ok_or_else(|| FileVersionError::NotFound {
                path: before.path().clone(),
                changeset_num: before.changeset().num(),
            })?;
        let after_file = self
            .files
            .get(after.path(), Some(after.changeset()))?
            .ok_or_else(|| FileVersionError::NotFound {
                path: after.path().clone(),
                changeset_num: after.changeset().num(),
            })?;
        Ok(diff_text(before_file.content(), after_file.content()))
    }
}
