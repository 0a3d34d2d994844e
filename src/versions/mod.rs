//! The version-control engine.
//!
//! Changeset lifecycle, the commit protocol that atomically flips per-path
//! pointers, the revision-history index, the versioning hooks over the
//! primitive file operations, and pairwise diff between revisions.

pub mod changeset;
pub mod file_version;
pub mod hooks;
pub mod pointer;
pub mod service;
pub mod vpath;
