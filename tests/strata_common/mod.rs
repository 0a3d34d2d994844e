//! Shared test fixture: an assembled service stack over the in-memory
//! store, with optional microversions and a pluggable query-consistency
//! policy.
#![allow(dead_code)]

use std::sync::Arc;

use strata::config::ServiceConfig;
use strata::counter::StrongCounter;
use strata::datastore::Datastore;
use strata::files::FileService;
use strata::hooks::{ServiceRegistry, WriteOp};
use strata::microversions::{self, MicroversionEngine, TaskQueue};
use strata::model::file::{File, MetaMap};
use strata::model::types::FilePath;
use strata::store::FileStore;
use strata::store::memory::{ConsistencyPolicy, MemoryFileStore};
use strata::versions::changeset::{Changeset, ChangesetStore};
use strata::versions::service::VersionControlService;

/// A fully wired service stack for tests.
pub struct TestStack {
    pub store: Arc<MemoryFileStore>,
    pub files: FileService,
    pub vcs: VersionControlService,
    pub engine: Option<MicroversionEngine>,
}

pub struct StackOptions {
    pub microversions: bool,
    pub policy: ConsistencyPolicy,
    pub task_payload_limit: usize,
}

impl Default for StackOptions {
    fn default() -> Self {
        let config = ServiceConfig::default();
        Self {
            microversions: false,
            policy: ConsistencyPolicy::Strong,
            task_payload_limit: config.microversions.task_payload_limit,
        }
    }
}

impl TestStack {
    /// Versioning service only, strong queries.
    pub fn versions_only() -> Self {
        Self::build(StackOptions::default())
    }

    /// Versioning plus microversions, strong queries.
    pub fn with_microversions() -> Self {
        Self::build(StackOptions {
            microversions: true,
            ..StackOptions::default()
        })
    }

    pub fn build(options: StackOptions) -> Self {
        let config = ServiceConfig::default();
        let store = Arc::new(MemoryFileStore::with_policy(options.policy));
        let dyn_store: Arc<dyn FileStore> = Arc::clone(&store) as Arc<dyn FileStore>;
        let ds = Datastore::new();
        let queue = Arc::new(TaskQueue::new(options.task_payload_limit));

        let mut registry = ServiceRegistry::new();
        if options.microversions {
            microversions::register(&mut registry, &dyn_store, &queue);
        }
        strata::versions::hooks::register(&mut registry, &ds, &dyn_store);

        let files = FileService::new(dyn_store, Arc::new(registry));
        let counter = StrongCounter::new(ds.clone(), config.counter.shard_count);
        let changesets = ChangesetStore::new(ds.clone(), counter);
        let vcs = VersionControlService::new(
            ds,
            files.clone(),
            changesets,
            config.history.query_limit,
        );
        let engine = options
            .microversions
            .then(|| MicroversionEngine::new(vcs.clone(), queue));

        Self {
            store,
            files,
            vcs,
            engine,
        }
    }

    pub fn engine(&self) -> &MicroversionEngine {
        self.engine.as_ref().expect("stack built without microversions")
    }

    // -----------------------------------------------------------------------
    // Shorthand helpers
    // -----------------------------------------------------------------------

    pub fn write(&self, cs: &Changeset, path: &str, content: &str) {
        let mut op = WriteOp::new(p(path));
        op.content = Some(content.to_owned());
        self.files.write(op, Some(cs)).unwrap();
    }

    pub fn write_meta(&self, cs: &Changeset, path: &str, key: &str, value: &str) {
        let mut meta = MetaMap::new();
        meta.insert(key.to_owned(), serde_json::Value::String(value.to_owned()));
        let mut op = WriteOp::new(p(path));
        op.meta = Some(meta);
        self.files.write(op, Some(cs)).unwrap();
    }

    pub fn stage_delete(&self, cs: &Changeset, path: &str) {
        let mut op = WriteOp::new(p(path));
        op.delete = true;
        self.files.write(op, Some(cs)).unwrap();
    }

    /// Associate `paths`, finalize, and commit with strong consistency.
    pub fn commit_manifest(&self, mut cs: Changeset, paths: &[&str]) -> Changeset {
        for path in paths {
            cs.associate_file(p(path));
        }
        cs.finalize_associated_files();
        self.vcs.commit(&cs, false).unwrap()
    }

    /// Commit from the (eventually consistent) enumeration.
    pub fn commit_force(&self, cs: &Changeset) -> Changeset {
        self.vcs.commit(cs, true).unwrap()
    }

    /// Write one file in a fresh changeset and commit it.
    pub fn commit_one(&self, path: &str, content: &str) -> Changeset {
        let cs = self.vcs.new_staging_changeset(None).unwrap();
        self.write(&cs, path, content);
        self.commit_manifest(cs, &[path])
    }

    pub fn get(&self, path: &str) -> Option<File> {
        self.files.get(&p(path), None).unwrap()
    }

    pub fn get_in(&self, path: &str, cs: &Changeset) -> Option<File> {
        self.files.get(&p(path), Some(cs)).unwrap()
    }

    pub fn content(&self, path: &str) -> String {
        self.get(path)
            .unwrap_or_else(|| panic!("no current revision of {path}"))
            .content()
            .to_owned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.exists(&p(path), None).unwrap()
    }
}

/// Shorthand path constructor.
pub fn p(s: &str) -> FilePath {
    FilePath::new(s).unwrap()
}
