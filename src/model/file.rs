//! Stored file records and the root/versioned file views.
//!
//! A [`FileRecord`] is what the primitive store persists per path: content
//! (or a blob reference for oversized content), a free-form user metadata
//! map, and audit stamps. A [`File`] is the caller-facing view — either a
//! plain root-tree file or a versioned view that reports the plain path
//! while the underlying record lives at `/_ver/<num>/...`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::types::{FilePath, FileStatus};
use crate::versions::vpath;

/// Free-form user metadata attached to a file.
///
/// `BTreeMap` for deterministic key ordering in canonical JSON.
pub type MetaMap = BTreeMap<String, serde_json::Value>;

/// The metadata key carrying the advisory staged-file status.
pub const META_STATUS_KEY: &str = "status";

// ---------------------------------------------------------------------------
// BlobRef
// ---------------------------------------------------------------------------

/// Reference to out-of-record blob content.
///
/// Issued by the store's `new_blob`; opaque to everything else. Blobs
/// referenced from committed history are never garbage collected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    /// Wrap a store-issued blob key.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self(key)
    }

    /// Return the blob key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// FileRecord
// ---------------------------------------------------------------------------

/// A file as persisted by the primitive store.
///
/// `path` is the stored path, which for staged files is the versioned path.
/// Exactly one of inline `content` or a `blob` reference carries the data;
/// a blob-backed record keeps `content` empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// The stored path (possibly versioned).
    pub path: FilePath,
    /// Inline content; empty when `blob` is set.
    pub content: String,
    /// Out-of-record content reference, if any.
    pub blob: Option<BlobRef>,
    /// User metadata, including the advisory `status` key on staged files.
    pub meta: MetaMap,
    /// ISO 8601 creation stamp.
    pub created: String,
    /// ISO 8601 last-modified stamp.
    pub modified: String,
    /// Who created the record.
    pub created_by: Option<String>,
    /// Who last modified the record.
    pub modified_by: Option<String>,
}

impl FileRecord {
    /// Size of the inline content in bytes (blob-backed records report the
    /// materialized content size once resolved).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// SHA-256 digest of the inline content, lowercase hex.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        let out = hasher.finalize();
        let mut hex = String::with_capacity(out.len() * 2);
        for byte in out {
            use std::fmt::Write as _;
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    /// The advisory status from the `status` meta key, if present and valid.
    ///
    /// Advisory only: the canonical record of what happened to a path at a
    /// commit is its `FileVersion` row, never this.
    #[must_use]
    pub fn status(&self) -> Option<FileStatus> {
        self.meta
            .get(META_STATUS_KEY)
            .and_then(serde_json::Value::as_str)
            .and_then(FileStatus::parse)
    }

    /// Set the advisory status meta key.
    pub(crate) fn set_status(&mut self, status: FileStatus) {
        self.meta.insert(
            META_STATUS_KEY.to_owned(),
            serde_json::Value::String(status.to_string()),
        );
    }
}

// ---------------------------------------------------------------------------
// File — root vs versioned view
// ---------------------------------------------------------------------------

/// A caller-facing file.
///
/// The two variants share one capability set (path, content, meta, stamps,
/// size, digest); the versioned variant additionally knows the versioned
/// path its record is stored at and always reports the *plain* path from
/// [`File::path`].
#[derive(Clone, Debug, PartialEq)]
pub enum File {
    /// A file in the root tree, stored at its plain path.
    Root(FileRecord),
    /// A staged or historical file stored under `/_ver/<num>/...`.
    Versioned {
        /// The plain path, with the version prefix stripped.
        path: FilePath,
        /// The changeset number encoded in the stored path.
        changeset_num: u64,
        /// The underlying record; `record.path` is the versioned path.
        record: FileRecord,
    },
}

impl File {
    /// Build the appropriate view for a stored record: records under the
    /// versioned subtree get the versioned view, everything else is root.
    #[must_use]
    pub fn from_stored(record: FileRecord) -> Self {
        match vpath::strip_version(&record.path) {
            Some((changeset_num, path)) => Self::Versioned {
                path,
                changeset_num,
                record,
            },
            None => Self::Root(record),
        }
    }

    /// The plain (user-visible) path.
    #[must_use]
    pub fn path(&self) -> &FilePath {
        match self {
            Self::Root(record) => &record.path,
            Self::Versioned { path, .. } => path,
        }
    }

    /// The versioned storage path, for versioned views.
    #[must_use]
    pub fn versioned_path(&self) -> Option<&FilePath> {
        match self {
            Self::Root(_) => None,
            Self::Versioned { record, .. } => Some(&record.path),
        }
    }

    /// The changeset number a versioned view is stored under.
    #[must_use]
    pub fn changeset_num(&self) -> Option<u64> {
        match self {
            Self::Root(_) => None,
            Self::Versioned { changeset_num, .. } => Some(*changeset_num),
        }
    }

    /// The underlying stored record.
    #[must_use]
    pub fn record(&self) -> &FileRecord {
        match self {
            Self::Root(record) | Self::Versioned { record, .. } => record,
        }
    }

    /// File content (blob content is materialized at read time).
    #[must_use]
    pub fn content(&self) -> &str {
        &self.record().content
    }

    /// User metadata map.
    #[must_use]
    pub fn meta(&self) -> &MetaMap {
        &self.record().meta
    }

    /// Advisory status from metadata.
    #[must_use]
    pub fn status(&self) -> Option<FileStatus> {
        self.record().status()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
