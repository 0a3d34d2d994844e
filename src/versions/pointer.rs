//! Per-path pointers to the current committed revision.
//!
//! A pointer row names the *staging* changeset number whose versioned copy
//! is the path's current revision — the staged blob is never moved on
//! commit, so the staging subtree doubles as the permanent archive. All
//! pointer rows live in one table and are only ever mutated inside the
//! commit transaction, which is what makes a multi-file commit atomic from
//! a reader's point of view.
//!
//! Absence of a pointer means absence of a current revision: either the
//! path was never committed, or its latest commit deleted it.

use serde::{Deserialize, Serialize};

use crate::model::types::FilePath;
use crate::versions::vpath;

/// A pointer row: path → staging changeset number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRecord {
    /// The plain file path.
    pub path: FilePath,
    /// The staging changeset whose versioned copy is current.
    pub changeset_num: u64,
}

impl PointerRecord {
    /// The versioned path this pointer dereferences to.
    #[must_use]
    pub fn versioned_path(&self) -> FilePath {
        vpath::versioned_path(&self.path, self.changeset_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_path_derivation() {
        let pointer = PointerRecord {
            path: FilePath::new("/foo.html").unwrap(),
            changeset_num: 1,
        };
        assert_eq!(pointer.versioned_path().as_str(), "/_ver/1/foo.html");
    }
}
