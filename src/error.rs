//! Error types for the Strata file service.
//!
//! Each concern gets its own enum — changeset lifecycle, revision-history
//! lookups, the commit protocol, path validation, and the primitive store —
//! and everything folds into the crate-level [`Error`] via `From`. Error
//! messages are designed to be self-contained: a caller receiving one should
//! be able to understand what happened and what to do next without extra
//! context.

use std::fmt;

use crate::model::types::{ChangesetStatus, FilePath};

// ---------------------------------------------------------------------------
// ChangesetError
// ---------------------------------------------------------------------------

/// Errors about changeset identity and lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangesetError {
    /// No changeset with this number has ever been allocated.
    NotFound {
        /// The changeset number that was requested.
        num: u64,
    },

    /// An operation required a changeset in a different status.
    ///
    /// Writes, touches, and deletes are only legal against a changeset that
    /// is still `new`; once a changeset has been committed (or tombstoned)
    /// its staged files are immutable history.
    Status {
        /// The changeset number.
        num: u64,
        /// The status the changeset actually has.
        status: ChangesetStatus,
        /// The operation that was attempted, e.g. `"write"`.
        action: &'static str,
    },

    /// A file operation that only makes sense inside a changeset was called
    /// without one.
    Required {
        /// The operation that was attempted.
        action: &'static str,
    },

    /// `list_files` was called without a changeset.
    ///
    /// The root tree is not guaranteed to be walkable, so listing is only
    /// supported against a changeset's versioned subtree.
    ListWithoutChangeset,

    /// No changeset has ever been submitted.
    NoneSubmitted,
}

impl fmt::Display for ChangesetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { num } => write!(f, "changeset {num} does not exist"),
            Self::Status {
                num,
                status,
                action,
            } => write!(
                f,
                "cannot {action} files in changeset {num} with status \"{status}\" — \
                 only \"new\" changesets accept changes"
            ),
            Self::Required { action } => write!(
                f,
                "{action} requires a changeset — allocate a staging changeset first"
            ),
            Self::ListWithoutChangeset => write!(
                f,
                "cannot list files without a changeset: the root tree is not walkable"
            ),
            Self::NoneSubmitted => write!(f, "no changesets have been submitted"),
        }
    }
}

impl std::error::Error for ChangesetError {}

// ---------------------------------------------------------------------------
// FileVersionError
// ---------------------------------------------------------------------------

/// A revision-history lookup failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileVersionError {
    /// No file version of this path exists at this changeset.
    NotFound {
        /// The plain file path.
        path: FilePath,
        /// The final changeset number the lookup was keyed on.
        changeset_num: u64,
    },
}

impl fmt::Display for FileVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound {
                path,
                changeset_num,
            } => write!(f, "no file version of {path} at changeset {changeset_num}"),
        }
    }
}

impl std::error::Error for FileVersionError {}

// ---------------------------------------------------------------------------
// CommitError
// ---------------------------------------------------------------------------

/// The commit protocol refused or aborted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitError {
    /// The staging changeset contains no file changes.
    EmptyChangeset {
        /// The staging changeset number.
        num: u64,
    },

    /// The staging changeset is not in `new` status.
    BadStatus {
        /// The staging changeset number.
        num: u64,
        /// The status it actually has.
        status: ChangesetStatus,
    },

    /// A non-forced commit was requested but the client never finalized a
    /// manifest of staged paths.
    ///
    /// Either associate the written paths and finalize them, or pass
    /// `force` to commit from the eventually-consistent file enumeration.
    ManifestNotFinalized {
        /// The staging changeset number.
        num: u64,
    },

    /// The pointer-flip transaction aborted.
    TransactionAborted {
        /// The staging changeset number.
        num: u64,
        /// Human-readable description of the abort.
        detail: String,
    },
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChangeset { num } => {
                write!(f, "changeset {num} contains no file changes")
            }
            Self::BadStatus { num, status } => {
                write!(f, "cannot commit changeset {num} with status \"{status}\"")
            }
            Self::ManifestNotFinalized { num } => write!(
                f,
                "commit of changeset {num} requires a finalized manifest — \
                 associate the staged paths and finalize them, or commit with force"
            ),
            Self::TransactionAborted { num, detail } => {
                write!(f, "commit transaction for changeset {num} aborted: {detail}")
            }
        }
    }
}

impl std::error::Error for CommitError {}

// ---------------------------------------------------------------------------
// PathError
// ---------------------------------------------------------------------------

/// A path argument failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathError {
    /// The offending value.
    pub value: String,
    /// Why it is invalid.
    pub reason: String,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid file path {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for PathError {}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// A primitive-store operation failed.
///
/// Transient failures are retried at the caller's discretion; nothing in
/// this crate retries automatically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The store RPC failed in a way that may succeed on retry.
    Transient {
        /// Human-readable description of the failure.
        detail: String,
    },

    /// A blob reference did not resolve to stored blob content.
    BlobMissing {
        /// The dangling blob key.
        key: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient { detail } => write!(f, "transient store failure: {detail}"),
            Self::BlobMissing { key } => write!(f, "blob {key} has no stored content"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Error — crate-level union
// ---------------------------------------------------------------------------

/// Unified error type for the Strata file service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Changeset identity or lifecycle problem.
    Changeset(ChangesetError),
    /// Revision-history lookup failure.
    FileVersion(FileVersionError),
    /// Commit protocol refusal or abort.
    Commit(CommitError),
    /// Path validation failure.
    Path(PathError),
    /// Primitive store failure.
    Store(StoreError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changeset(e) => e.fmt(f),
            Self::FileVersion(e) => e.fmt(f),
            Self::Commit(e) => e.fmt(f),
            Self::Path(e) => e.fmt(f),
            Self::Store(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Changeset(e) => Some(e),
            Self::FileVersion(e) => Some(e),
            Self::Commit(e) => Some(e),
            Self::Path(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<ChangesetError> for Error {
    fn from(e: ChangesetError) -> Self {
        Self::Changeset(e)
    }
}

impl From<FileVersionError> for Error {
    fn from(e: FileVersionError) -> Self {
        Self::FileVersion(e)
    }
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        Self::Commit(e)
    }
}

impl From<PathError> for Error {
    fn from(e: PathError) -> Self {
        Self::Path(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
