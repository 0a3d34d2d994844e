//! Revision-history rows: one `FileVersion` per (final changeset, path).
//!
//! File-version rows are the canonical record of what happened to a path
//! at a commit. Always trust them over the advisory `status` meta key on
//! staged files. Rows are written once, inside the commit transaction, and
//! never mutated.
//!
//! Rows are deliberately lightweight: everything written here multiplies
//! by the number of paths in a commit.

use serde::{Deserialize, Serialize};

use crate::datastore::Datastore;
use crate::error::{FileVersionError, Result};
use crate::model::types::{FilePath, FileStatus};
use crate::versions::changeset::Changeset;
use crate::versions::vpath;

/// Key of a file-version row: `"<changeset_num>:<path>"`.
#[must_use]
pub fn key(changeset_num: u64, path: &FilePath) -> String {
    format!("{changeset_num}:{path}")
}

// ---------------------------------------------------------------------------
// FileVersionRecord
// ---------------------------------------------------------------------------

/// A file-version row as persisted in the datastore.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersionRecord {
    /// The plain committed path.
    pub path: FilePath,
    /// The final changeset the path was committed in.
    pub changeset_num: u64,
    /// Who created that changeset.
    pub changeset_created_by: Option<String>,
    /// ISO 8601 stamp of the commit.
    pub created: String,
    /// What happened to the path: created, edited, or deleted.
    pub status: FileStatus,
}

// ---------------------------------------------------------------------------
// FileVersion
// ---------------------------------------------------------------------------

/// Lazy handle to a file-version row.
#[derive(Clone, Debug)]
pub struct FileVersion {
    path: FilePath,
    changeset: Changeset,
    record: std::sync::OnceLock<FileVersionRecord>,
}

impl FileVersion {
    /// Handle to the version of `path` at final changeset `changeset_num`.
    #[must_use]
    pub fn new(path: FilePath, changeset_num: u64) -> Self {
        Self {
            path,
            changeset: Changeset::new(changeset_num),
            record: std::sync::OnceLock::new(),
        }
    }

    /// Handle pre-populated with a stored record.
    #[must_use]
    pub(crate) fn with_record(record: FileVersionRecord) -> Self {
        let handle = Self::new(record.path.clone(), record.changeset_num);
        let _ = handle.record.set(record);
        handle
    }

    /// The plain committed path.
    #[must_use]
    pub fn path(&self) -> &FilePath {
        &self.path
    }

    /// The final changeset this version belongs to.
    #[must_use]
    pub fn changeset(&self) -> &Changeset {
        &self.changeset
    }

    /// The path of the historical blob.
    ///
    /// Derived from the final changeset number; dereference through the
    /// changeset's read number to reach the actual staging subtree.
    #[must_use]
    pub fn versioned_path(&self) -> FilePath {
        vpath::versioned_path(&self.path, self.changeset.num())
    }

    /// The stored row, hydrating and caching on first access.
    ///
    /// # Errors
    /// [`FileVersionError::NotFound`] if no version of this path exists at
    /// this changeset.
    pub fn record(&self, ds: &Datastore) -> Result<&FileVersionRecord, FileVersionError> {
        if let Some(record) = self.record.get() {
            return Ok(record);
        }
        let record = ds.file_version(self.changeset.num(), &self.path).ok_or_else(|| {
            FileVersionError::NotFound {
                path: self.path.clone(),
                changeset_num: self.changeset.num(),
            }
        })?;
        Ok(self.record.get_or_init(|| record))
    }

    /// The edit type recorded at this commit.
    ///
    /// # Errors
    /// [`FileVersionError::NotFound`] if the row does not exist.
    pub fn status(&self, ds: &Datastore) -> Result<FileStatus, FileVersionError> {
        Ok(self.record(ds)?.status)
    }

    /// JSON shape used by the handler layer and history listings.
    ///
    /// # Errors
    /// [`FileVersionError::NotFound`] if the row does not exist.
    pub fn to_json(&self, ds: &Datastore) -> Result<serde_json::Value> {
        let record = self.record(ds)?;
        Ok(serde_json::json!({
            "path": record.path,
            "versioned_path": self.versioned_path(),
            "created": record.created,
            "status": record.status,
            "changeset_num": record.changeset_num,
            "changeset_created_by": record.changeset_created_by,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::now_timestamp_iso8601;

    fn path(s: &str) -> FilePath {
        FilePath::new(s).unwrap()
    }

    fn seeded(num: u64, p: &str, status: FileStatus) -> Datastore {
        let ds = Datastore::new();
        ds.transaction(|tables| {
            tables.file_versions.insert(
                key(num, &path(p)),
                FileVersionRecord {
                    path: path(p),
                    changeset_num: num,
                    changeset_created_by: Some("me".into()),
                    created: now_timestamp_iso8601(),
                    status,
                },
            );
            Ok(())
        })
        .unwrap();
        ds
    }

    #[test]
    fn key_encoding() {
        assert_eq!(key(123, &path("/foo.html")), "123:/foo.html");
    }

    #[test]
    fn hydrates_stored_row() {
        let ds = seeded(2, "/foo", FileStatus::Created);
        let version = FileVersion::new(path("/foo"), 2);
        assert_eq!(version.status(&ds).unwrap(), FileStatus::Created);
        assert_eq!(version.versioned_path().as_str(), "/_ver/2/foo");
    }

    #[test]
    fn missing_row_fails() {
        let ds = Datastore::new();
        let version = FileVersion::new(path("/foo"), 2);
        assert!(matches!(
            version.status(&ds),
            Err(FileVersionError::NotFound { .. })
        ));
    }

    #[test]
    fn json_shape() {
        let ds = seeded(2, "/foo", FileStatus::Edited);
        let version = FileVersion::new(path("/foo"), 2);
        let json = version.to_json(&ds).unwrap();
        assert_eq!(json["path"], "/foo");
        assert_eq!(json["versioned_path"], "/_ver/2/foo");
        assert_eq!(json["status"], "edited");
        assert_eq!(json["changeset_num"], 2);
        assert_eq!(json["changeset_created_by"], "me");
    }
}
