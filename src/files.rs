//! The file service facade.
//!
//! [`FileService`] is what callers hold: the primitive file operations,
//! each dispatched through the hook pipeline before (and after) the inner
//! store call. With an empty registry it is a thin veneer over the store;
//! with the versioning and microversions services registered it becomes
//! the transparent version-control surface.
//!
//! Every operation accepts an optional changeset argument. The facade
//! never interprets it — hooks do.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result, StoreError};
use crate::hooks::{OpArgs, OpContext, OpKind, OpResult, PreOutcome, ServiceRegistry, WriteOp};
use crate::model::file::{File, FileRecord, MetaMap};
use crate::model::types::FilePath;
use crate::store::{FileStore, WriteRequest};
use crate::versions::changeset::Changeset;

/// The hook-dispatching file service.
#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn FileStore>,
    registry: Arc<ServiceRegistry>,
}

impl FileService {
    /// A service dispatching through the given registry.
    #[must_use]
    pub fn new(store: Arc<dyn FileStore>, registry: Arc<ServiceRegistry>) -> Self {
        Self { store, registry }
    }

    /// A service with no hooks — direct store access.
    #[must_use]
    pub fn plain(store: Arc<dyn FileStore>) -> Self {
        Self::new(store, Arc::new(ServiceRegistry::new()))
    }

    /// The underlying primitive store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Primitive operations
    // -----------------------------------------------------------------------

    /// Whether `path` exists (in the current revision set, or within the
    /// given changeset — where staged delete tombstones still count).
    ///
    /// # Errors
    /// Propagates hook and store failures.
    pub fn exists(&self, path: &FilePath, changeset: Option<&Changeset>) -> Result<bool> {
        match self.dispatch(OpArgs::Exists { path: path.clone() }, changeset)? {
            OpResult::Bool(value) => Ok(value),
            _ => Err(unexpected_shape(OpKind::Exists)),
        }
    }

    /// Fetch one file, or `None` if it has no current revision.
    ///
    /// # Errors
    /// Propagates hook and store failures.
    pub fn get(&self, path: &FilePath, changeset: Option<&Changeset>) -> Result<Option<File>> {
        let mut files = self.get_many(std::slice::from_ref(path), changeset)?;
        Ok(files.remove(path))
    }

    /// Fetch a batch of files, keyed by plain path. Unknown paths are
    /// simply absent from the result.
    ///
    /// # Errors
    /// Propagates hook and store failures.
    pub fn get_many(
        &self,
        paths: &[FilePath],
        changeset: Option<&Changeset>,
    ) -> Result<BTreeMap<FilePath, File>> {
        let args = OpArgs::Get {
            paths: paths.to_vec(),
        };
        match self.dispatch(args, changeset)? {
            OpResult::Files(files) => Ok(files),
            _ => Err(unexpected_shape(OpKind::Get)),
        }
    }

    /// Create or update a file.
    ///
    /// # Errors
    /// Propagates hook and store failures.
    pub fn write(&self, op: WriteOp, changeset: Option<&Changeset>) -> Result<()> {
        match self.dispatch(OpArgs::Write(op), changeset)? {
            OpResult::Unit => Ok(()),
            _ => Err(unexpected_shape(OpKind::Write)),
        }
    }

    /// Touch a batch of paths.
    ///
    /// # Errors
    /// Propagates hook and store failures.
    pub fn touch(
        &self,
        paths: Vec<FilePath>,
        meta: Option<MetaMap>,
        created_by: Option<String>,
        changeset: Option<&Changeset>,
    ) -> Result<()> {
        let args = OpArgs::Touch {
            paths,
            meta,
            created_by,
        };
        match self.dispatch(args, changeset)? {
            OpResult::Unit => Ok(()),
            _ => Err(unexpected_shape(OpKind::Touch)),
        }
    }

    /// Delete a batch of paths. Within a changeset this reverts the staged
    /// copies rather than touching the root tree.
    ///
    /// # Errors
    /// Propagates hook and store failures.
    pub fn delete(&self, paths: Vec<FilePath>, changeset: Option<&Changeset>) -> Result<()> {
        match self.dispatch(OpArgs::Delete { paths }, changeset)? {
            OpResult::Unit => Ok(()),
            _ => Err(unexpected_shape(OpKind::Delete)),
        }
    }

    /// List files under `dir`.
    ///
    /// # Errors
    /// Propagates hook and store failures; the versioning service rejects
    /// listings without a changeset.
    pub fn list_files(
        &self,
        dir: &FilePath,
        recursive: bool,
        changeset: Option<&Changeset>,
    ) -> Result<Vec<File>> {
        let args = OpArgs::ListFiles {
            dir_path: dir.clone(),
            recursive,
        };
        match self.dispatch(args, changeset)? {
            OpResult::FileList(files) => Ok(files),
            _ => Err(unexpected_shape(OpKind::ListFiles)),
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn dispatch(&self, args: OpArgs, changeset: Option<&Changeset>) -> Result<OpResult> {
        let kind = args.kind();
        let ctx = OpContext {
            changeset: changeset.cloned(),
        };

        let mut args = args;
        let mut ran: Vec<Box<dyn crate::hooks::FileOpHook>> = Vec::new();
        for mut hook in self.registry.instantiate(kind) {
            match hook.pre(args, &ctx)? {
                PreOutcome::Proceed(next) => {
                    args = next;
                    ran.push(hook);
                }
                PreOutcome::ShortCircuit(result) => return Ok(result),
            }
        }

        let mut result = self.raw(args)?;
        for hook in ran.iter_mut().rev() {
            result = hook.post(result, &ctx)?;
        }
        Ok(result)
    }

    /// The inner call: the primitive store, no hooks.
    fn raw(&self, args: OpArgs) -> Result<OpResult> {
        match args {
            OpArgs::Exists { path } => Ok(OpResult::Bool(self.store.exists(&path)?)),
            OpArgs::Get { paths } => {
                let records = self.store.get(&paths)?;
                let mut files = BTreeMap::new();
                for (path, mut record) in records {
                    self.materialize_blob(&mut record)?;
                    files.insert(path, File::from_stored(record));
                }
                Ok(OpResult::Files(files))
            }
            OpArgs::Write(op) => {
                let request = WriteRequest {
                    path: op.path,
                    content: op.content,
                    blob: op.blob,
                    meta: op.meta,
                    modified_by: op.created_by,
                };
                self.store.write(request)?;
                Ok(OpResult::Unit)
            }
            OpArgs::Touch {
                paths,
                meta,
                created_by,
            } => {
                self.store
                    .touch(&paths, meta.as_ref(), created_by.as_deref())?;
                Ok(OpResult::Unit)
            }
            OpArgs::Delete { paths } => {
                self.store.delete(&paths)?;
                Ok(OpResult::Unit)
            }
            OpArgs::ListFiles {
                dir_path,
                recursive,
            } => {
                let records = self.store.list_files(&dir_path, recursive)?;
                let mut files = Vec::with_capacity(records.len());
                for mut record in records {
                    self.materialize_blob(&mut record)?;
                    files.push(File::from_stored(record));
                }
                Ok(OpResult::FileList(files))
            }
        }
    }

    /// Resolve blob-backed content so callers always see materialized text.
    fn materialize_blob(&self, record: &mut FileRecord) -> Result<()> {
        if record.content.is_empty() {
            if let Some(blob) = record.blob.clone() {
                record.content = self.store.read_blob(&blob)?;
            }
        }
        Ok(())
    }
}

fn unexpected_shape(op: OpKind) -> Error {
    Error::Store(StoreError::Transient {
        detail: format!("hook pipeline returned a mismatched result shape for {op}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FileOpHook;
    use crate::store::memory::MemoryFileStore;

    fn path(s: &str) -> FilePath {
        FilePath::new(s).unwrap()
    }

    fn plain_service() -> FileService {
        FileService::plain(Arc::new(MemoryFileStore::new()))
    }

    #[test]
    fn plain_write_and_get() {
        let files = plain_service();
        let mut op = WriteOp::new(path("/a"));
        op.content = Some("hello".into());
        files.write(op, None).unwrap();

        let file = files.get(&path("/a"), None).unwrap().unwrap();
        assert_eq!(file.content(), "hello");
        assert!(files.exists(&path("/a"), None).unwrap());
        assert!(files.get(&path("/missing"), None).unwrap().is_none());
    }

    #[test]
    fn blob_content_materializes_on_read() {
        let files = plain_service();
        let blob = files.store().new_blob("from blob").unwrap();
        let mut op = WriteOp::new(path("/a"));
        op.blob = Some(blob);
        files.write(op, None).unwrap();

        let file = files.get(&path("/a"), None).unwrap().unwrap();
        assert_eq!(file.content(), "from blob");
    }

    // A hook that rewrites every get to a fixed path, to prove dispatch
    // composes pres, the inner call, and posts in the right order.
    struct Redirect;
    impl FileOpHook for Redirect {
        fn pre(&mut self, args: OpArgs, _ctx: &OpContext) -> Result<PreOutcome> {
            match args {
                OpArgs::Get { .. } => Ok(PreOutcome::Proceed(OpArgs::Get {
                    paths: vec![FilePath::new("/actual").unwrap()],
                })),
                other => Ok(PreOutcome::Proceed(other)),
            }
        }
    }

    struct Short;
    impl FileOpHook for Short {
        fn pre(&mut self, _args: OpArgs, _ctx: &OpContext) -> Result<PreOutcome> {
            Ok(PreOutcome::ShortCircuit(OpResult::Bool(true)))
        }

        fn post(&mut self, _result: OpResult, _ctx: &OpContext) -> Result<OpResult> {
            panic!("post must not run for the short-circuiting hook's own call");
        }
    }

    #[test]
    fn pre_hooks_rewrite_arguments() {
        let store = Arc::new(MemoryFileStore::new());
        let mut registry = ServiceRegistry::new();
        registry.register(OpKind::Get, "redirect", Arc::new(|| Box::new(Redirect)));
        let files = FileService::new(store, Arc::new(registry));

        let mut op = WriteOp::new(path("/actual"));
        op.content = Some("x".into());
        files.write(op, None).unwrap();

        let fetched = files.get_many(&[path("/requested")], None).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched.contains_key(&path("/actual")));
    }

    #[test]
    fn short_circuit_skips_inner_call_and_posts() {
        let store = Arc::new(MemoryFileStore::new());
        let mut registry = ServiceRegistry::new();
        registry.register(OpKind::Exists, "short", Arc::new(|| Box::new(Short)));
        let files = FileService::new(store, Arc::new(registry));

        // `/nope` does not exist in the store; only the short-circuit can
        // produce `true`.
        assert!(files.exists(&path("/nope"), None).unwrap());
    }
}
