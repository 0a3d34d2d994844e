//! Primitive file store trait and common request types.
//!
//! Defines the capability set the version-control engine consumes from the
//! primitive store: `exists`, `get`, `write`, `touch`, `delete`, `copy`, and
//! `list_files` over plain paths, plus blob overflow for oversized content.
//! The store knows nothing about changesets or versioning — versioned paths
//! are just paths to it.
//!
//! # Consistency contract
//!
//! - Key-addressed reads (`exists`, `get`, `read_blob`) are strongly
//!   consistent: a completed `write` is immediately visible.
//! - Directory queries (`list_files`) are only eventually consistent. A
//!   write issued shortly before a listing may be missing from the result.
//!   Callers that need an exact enumeration must keep their own manifest
//!   and use the key-addressed reads.

pub mod memory;

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::model::file::{BlobRef, FileRecord, MetaMap};
use crate::model::types::FilePath;

// ---------------------------------------------------------------------------
// WriteRequest
// ---------------------------------------------------------------------------

/// Arguments for a primitive write.
///
/// `content` and `blob` are mutually exclusive; setting either replaces the
/// file's data. Leaving both unset performs a metadata-only update that
/// preserves existing content. `meta` keys merge into the existing map.
#[derive(Clone, Debug)]
pub struct WriteRequest {
    /// Destination path.
    pub path: FilePath,
    /// New inline content, replacing any existing content and blob.
    pub content: Option<String>,
    /// New blob reference, replacing any existing content and blob.
    pub blob: Option<BlobRef>,
    /// Metadata keys to merge into the file's meta map.
    pub meta: Option<MetaMap>,
    /// Who performed the write.
    pub modified_by: Option<String>,
}

impl WriteRequest {
    /// Start a write request for `path`.
    #[must_use]
    pub fn to(path: FilePath) -> Self {
        Self {
            path,
            content: None,
            blob: None,
            meta: None,
            modified_by: None,
        }
    }

    /// Set inline content.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set a blob reference.
    #[must_use]
    pub fn blob(mut self, blob: BlobRef) -> Self {
        self.blob = Some(blob);
        self
    }

    /// Merge metadata keys.
    #[must_use]
    pub fn meta(mut self, meta: MetaMap) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Record the author.
    #[must_use]
    pub fn by(mut self, user: impl Into<String>) -> Self {
        self.modified_by = Some(user.into());
        self
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// The primitive file store capability set.
///
/// Implementations are shared across threads; interior synchronization is
/// the implementation's concern.
pub trait FileStore: Send + Sync {
    /// Whether a file exists at `path`. Strongly consistent.
    fn exists(&self, path: &FilePath) -> Result<bool, StoreError>;

    /// Fetch the records stored at `paths`, keyed by stored path.
    ///
    /// Missing paths are simply absent from the result. Strongly consistent.
    fn get(&self, paths: &[FilePath]) -> Result<BTreeMap<FilePath, FileRecord>, StoreError>;

    /// Create or update the file at the request's path.
    fn write(&self, request: WriteRequest) -> Result<(), StoreError>;

    /// Bump the modified stamp of each path, creating empty files for paths
    /// that don't exist. Metadata keys merge as in `write`.
    fn touch(
        &self,
        paths: &[FilePath],
        meta: Option<&MetaMap>,
        modified_by: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Remove the files at `paths`. Deleting a missing path is a no-op.
    ///
    /// Blobs referenced by removed files are retained; history may still
    /// point at them.
    fn delete(&self, paths: &[FilePath]) -> Result<(), StoreError>;

    /// Copy the record at `source` to `dest` verbatim — content, blob
    /// reference, and user metadata.
    fn copy(&self, source: &FilePath, dest: &FilePath) -> Result<(), StoreError>;

    /// List the files under `dir`. Eventually consistent (see module docs).
    fn list_files(&self, dir: &FilePath, recursive: bool)
        -> Result<Vec<FileRecord>, StoreError>;

    /// Store blob content, returning a reference to it.
    fn new_blob(&self, content: &str) -> Result<BlobRef, StoreError>;

    /// Read blob content back.
    fn read_blob(&self, blob: &BlobRef) -> Result<String, StoreError>;
}
