//! Versioned path rewriting.
//!
//! A file staged in changeset `N` is stored at `/_ver/<N><path>`, so the
//! versioned copy of `/foo/bar.html` in changeset 12 lives at
//! `/_ver/12/foo/bar.html`. The prefix is parsed by hand — the grammar is
//! a literal marker followed by decimal digits.

use crate::model::types::FilePath;

/// Marker prefix of the versioned subtree.
pub const VERSIONS_PATH_BASE: &str = "/_ver/";

/// The versioned path of `path` in changeset `num`.
#[must_use]
pub fn versioned_path(path: &FilePath, num: u64) -> FilePath {
    FilePath::from_trusted(format!("/_ver/{num}{path}"))
}

/// Versioned paths for a batch, preserving order and multiplicity.
#[must_use]
pub fn versioned_paths(paths: &[FilePath], num: u64) -> Vec<FilePath> {
    paths.iter().map(|p| versioned_path(p, num)).collect()
}

/// The versioned form of a *directory* argument.
///
/// The root directory maps to the changeset's subtree root `/_ver/<num>`
/// rather than `/_ver/<num>/`, which would not be a valid path.
#[must_use]
pub fn versioned_dir(dir: &FilePath, num: u64) -> FilePath {
    if dir.is_root() {
        FilePath::from_trusted(format!("/_ver/{num}"))
    } else {
        versioned_path(dir, num)
    }
}

/// Split a versioned path into `(changeset_num, plain_path)`.
///
/// Returns `None` for paths outside the versioned subtree. The subtree
/// root `/_ver/<num>` maps back to the root directory.
#[must_use]
pub fn strip_version(path: &FilePath) -> Option<(u64, FilePath)> {
    let rest = path.as_str().strip_prefix(VERSIONS_PATH_BASE)?;
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let num: u64 = rest[..digits_end].parse().ok()?;
    let plain = &rest[digits_end..];
    if plain.is_empty() {
        return Some((num, FilePath::root()));
    }
    if !plain.starts_with('/') {
        return None;
    }
    Some((num, FilePath::from_trusted(plain.to_owned())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
