//! Strata — a versioned, content-addressable file service.
//!
//! Atomic multi-file commits, per-path revision history, and a
//! microversions mode that autosnapshots every write. Clients address
//! files by absolute POSIX-style paths; writes group into numbered
//! *changesets* that commit atomically, flipping a per-path *pointer* to
//! the newest revision.
//!
//! # Assembling the stack
//!
//! ```
//! use std::sync::Arc;
//!
//! use strata::config::ServiceConfig;
//! use strata::counter::StrongCounter;
//! use strata::datastore::Datastore;
//! use strata::files::FileService;
//! use strata::hooks::{ServiceRegistry, WriteOp};
//! use strata::model::types::FilePath;
//! use strata::store::FileStore;
//! use strata::store::memory::MemoryFileStore;
//! use strata::versions::changeset::ChangesetStore;
//! use strata::versions::service::VersionControlService;
//!
//! let config = ServiceConfig::default();
//! let store: Arc<dyn FileStore> = Arc::new(MemoryFileStore::new());
//! let ds = Datastore::new();
//!
//! let mut registry = ServiceRegistry::new();
//! strata::versions::hooks::register(&mut registry, &ds, &store);
//!
//! let files = FileService::new(store, Arc::new(registry));
//! let counter = StrongCounter::new(ds.clone(), config.counter.shard_count);
//! let changesets = ChangesetStore::new(ds.clone(), counter);
//! let vcs = VersionControlService::new(ds, files.clone(), changesets, config.history.query_limit);
//!
//! // Write a file inside a staging changeset and commit it.
//! let mut cs = vcs.new_staging_changeset(None).unwrap();
//! let path = FilePath::new("/hello.txt").unwrap();
//! let mut op = WriteOp::new(path.clone());
//! op.content = Some("hello".into());
//! files.write(op, Some(&cs)).unwrap();
//! cs.associate_file(path.clone());
//! cs.finalize_associated_files();
//! vcs.commit(&cs, false).unwrap();
//!
//! let file = files.get(&path, None).unwrap().unwrap();
//! assert_eq!(file.content(), "hello");
//! ```

pub mod api;
pub mod config;
pub mod counter;
pub mod datastore;
pub mod error;
pub mod files;
pub mod hooks;
pub mod microversions;
pub mod model;
pub mod store;
pub mod telemetry;
pub mod versions;
