//! The versioning service's hooks over the primitive file operations.
//!
//! These six hooks make versioning transparent: callers keep using plain
//! paths and the optional changeset argument, and the hooks rewrite every
//! call onto the `/_ver/<num>` subtree or resolve it through the pointer
//! table.
//!
//! Per-op semantics:
//!
//! - `exists` without a changeset short-circuits on pointer existence;
//!   with one, it probes the staged copy (where delete tombstones still
//!   count as existing — the in-changeset view includes them).
//! - `get` without a changeset dereferences pointers and silently drops
//!   unknown paths; with one, it reads the staged copies.
//! - `write`/`touch` require a `new` changeset, branch the current root
//!   revision into the staging subtree on first touch, and stamp the
//!   advisory status meta key.
//! - `delete` inside a changeset is a *revert*: it removes the staged
//!   copies, never root-tree files.
//! - `list_files` requires a changeset and walks its subtree.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::datastore::Datastore;
use crate::error::{ChangesetError, Result};
use crate::hooks::{
    FileOpHook, OpArgs, OpContext, OpKind, OpResult, PreOutcome, ServiceRegistry,
};
use crate::model::file::{File, MetaMap};
use crate::model::types::{ChangesetStatus, FilePath, FileStatus};
use crate::store::FileStore;
use crate::versions::changeset::Changeset;
use crate::versions::vpath;

/// Registry name of the versioning service.
pub const SERVICE_NAME: &str = "versions";

/// Register the versioning hooks for all six operations.
pub fn register(registry: &mut ServiceRegistry, ds: &Datastore, store: &Arc<dyn FileStore>) {
    let d = ds.clone();
    registry.register(
        OpKind::Exists,
        SERVICE_NAME,
        Arc::new(move || Box::new(ExistsHook { ds: d.clone() })),
    );
    let d = ds.clone();
    registry.register(
        OpKind::Get,
        SERVICE_NAME,
        Arc::new(move || Box::new(GetHook { ds: d.clone() })),
    );
    let (d, s) = (ds.clone(), Arc::clone(store));
    registry.register(
        OpKind::Write,
        SERVICE_NAME,
        Arc::new(move || {
            Box::new(WriteHook {
                ds: d.clone(),
                store: Arc::clone(&s),
            })
        }),
    );
    let (d, s) = (ds.clone(), Arc::clone(store));
    registry.register(
        OpKind::Touch,
        SERVICE_NAME,
        Arc::new(move || {
            Box::new(TouchHook {
                ds: d.clone(),
                store: Arc::clone(&s),
            })
        }),
    );
    let d = ds.clone();
    registry.register(
        OpKind::Delete,
        SERVICE_NAME,
        Arc::new(move || Box::new(DeleteHook { ds: d.clone() })),
    );
    let d = ds.clone();
    registry.register(
        OpKind::ListFiles,
        SERVICE_NAME,
        Arc::new(move || Box::new(ListFilesHook { ds: d.clone() })),
    );
}

/// Reject changesets that no longer accept changes.
fn verify_is_new(
    cs: &Changeset,
    ds: &Datastore,
    action: &'static str,
) -> Result<(), ChangesetError> {
    let status = cs.status(ds)?;
    if status != ChangesetStatus::New {
        return Err(ChangesetError::Status {
            num: cs.num(),
            status,
            action,
        });
    }
    Ok(())
}

fn set_meta_status(meta: &mut MetaMap, status: FileStatus) {
    meta.insert(
        crate::model::file::META_STATUS_KEY.to_owned(),
        serde_json::Value::String(status.to_string()),
    );
}

// ---------------------------------------------------------------------------
// Branch-from-root
// ---------------------------------------------------------------------------

/// On first write or touch of `path` in a staging changeset, copy the
/// current root revision into the staging subtree verbatim.
///
/// Guarantees that partial writes (say, metadata only) observe full prior
/// state, and that a revert within a changeset is expressible as deleting
/// the staged copy. A staged copy that exists and is not a delete
/// tombstone short-circuits; a tombstone is overwritten (un-delete).
///
/// The copy source is the pointer's versioned path when a pointer exists;
/// otherwise a root-tree file at the plain path (the microversions world);
/// otherwise nothing — the path is brand new.
pub(crate) fn branch_from_root(
    ds: &Datastore,
    store: &dyn FileStore,
    path: &FilePath,
    staging_num: u64,
) -> Result<()> {
    let staged_path = vpath::versioned_path(path, staging_num);
    let mut staged = store.get(std::slice::from_ref(&staged_path))?;
    if let Some(record) = staged.remove(&staged_path) {
        if record.status() != Some(FileStatus::Deleted) {
            return Ok(());
        }
    }

    let source = if let Some(pointer) = ds.pointer(path) {
        Some(pointer.versioned_path())
    } else if store.exists(path)? {
        Some(path.clone())
    } else {
        None
    };
    if let Some(source) = source {
        store.copy(&source, &staged_path)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

struct ExistsHook {
    ds: Datastore,
}

impl FileOpHook for ExistsHook {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        let OpArgs::Exists { path } = args else {
            return Ok(PreOutcome::Proceed(args));
        };
        match &ctx.changeset {
            // A pointer exists exactly when a committed revision exists.
            None => Ok(PreOutcome::ShortCircuit(OpResult::Bool(
                self.ds.pointer(&path).is_some(),
            ))),
            Some(cs) => {
                let num = cs.read_num(&self.ds)?;
                Ok(PreOutcome::Proceed(OpArgs::Exists {
                    path: vpath::versioned_path(&path, num),
                }))
            }
        }
    }
}

struct GetHook {
    ds: Datastore,
}

impl FileOpHook for GetHook {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        let OpArgs::Get { paths } = args else {
            return Ok(PreOutcome::Proceed(args));
        };
        match &ctx.changeset {
            None => {
                // Follow the latest pointers; paths without one are dropped.
                let pointers = self.ds.pointers(&paths);
                let versioned: Vec<FilePath> = paths
                    .iter()
                    .filter_map(|path| pointers.get(path))
                    .map(super::pointer::PointerRecord::versioned_path)
                    .collect();
                if versioned.is_empty() {
                    return Ok(PreOutcome::ShortCircuit(OpResult::Files(BTreeMap::new())));
                }
                Ok(PreOutcome::Proceed(OpArgs::Get { paths: versioned }))
            }
            Some(cs) => {
                let num = cs.read_num(&self.ds)?;
                Ok(PreOutcome::Proceed(OpArgs::Get {
                    paths: vpath::versioned_paths(&paths, num),
                }))
            }
        }
    }

    fn post(&mut self, result: OpResult, _ctx: &OpContext) -> Result<OpResult> {
        // Rekey from stored (versioned) paths to plain paths.
        let OpResult::Files(files) = result else {
            return Ok(result);
        };
        Ok(OpResult::Files(
            files
                .into_values()
                .map(|file| (file.path().clone(), file))
                .collect(),
        ))
    }
}

struct WriteHook {
    ds: Datastore,
    store: Arc<dyn FileStore>,
}

impl FileOpHook for WriteHook {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        let OpArgs::Write(mut op) = args else {
            return Ok(PreOutcome::Proceed(args));
        };
        let cs = ctx
            .changeset
            .as_ref()
            .ok_or(ChangesetError::Required { action: "write" })?;
        verify_is_new(cs, &self.ds, "write")?;

        let mut meta = op.meta.take().unwrap_or_default();
        if op.delete {
            // Stage a delete tombstone: empty content, deleted status.
            op.content = Some(String::new());
            op.blob = None;
            set_meta_status(&mut meta, FileStatus::Deleted);
        } else {
            branch_from_root(&self.ds, self.store.as_ref(), &op.path, cs.num())?;
            set_meta_status(&mut meta, FileStatus::Edited);
        }
        op.meta = Some(meta);
        op.path = vpath::versioned_path(&op.path, cs.num());
        op.delete = false;
        Ok(PreOutcome::Proceed(OpArgs::Write(op)))
    }
}

struct TouchHook {
    ds: Datastore,
    store: Arc<dyn FileStore>,
}

impl FileOpHook for TouchHook {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        let OpArgs::Touch {
            paths,
            meta,
            created_by,
        } = args
        else {
            return Ok(PreOutcome::Proceed(args));
        };
        let cs = ctx
            .changeset
            .as_ref()
            .ok_or(ChangesetError::Required { action: "touch" })?;
        verify_is_new(cs, &self.ds, "touch")?;

        for path in &paths {
            branch_from_root(&self.ds, self.store.as_ref(), path, cs.num())?;
        }
        let mut meta = meta.unwrap_or_default();
        set_meta_status(&mut meta, FileStatus::Edited);
        Ok(PreOutcome::Proceed(OpArgs::Touch {
            paths: vpath::versioned_paths(&paths, cs.num()),
            meta: Some(meta),
            created_by,
        }))
    }
}

struct DeleteHook {
    ds: Datastore,
}

impl FileOpHook for DeleteHook {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        let OpArgs::Delete { paths } = args else {
            return Ok(PreOutcome::Proceed(args));
        };
        let cs = ctx
            .changeset
            .as_ref()
            .ok_or(ChangesetError::Required { action: "delete" })?;
        verify_is_new(cs, &self.ds, "delete")?;

        // A delete in the files world is a revert in the versions world:
        // only the staged copies go away.
        Ok(PreOutcome::Proceed(OpArgs::Delete {
            paths: vpath::versioned_paths(&paths, cs.num()),
        }))
    }
}

struct ListFilesHook {
    ds: Datastore,
}

impl FileOpHook for ListFilesHook {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        let OpArgs::ListFiles {
            dir_path,
            recursive,
        } = args
        else {
            return Ok(PreOutcome::Proceed(args));
        };
        let Some(cs) = &ctx.changeset else {
            return Err(ChangesetError::ListWithoutChangeset.into());
        };
        let num = cs.read_num(&self.ds)?;
        Ok(PreOutcome::Proceed(OpArgs::ListFiles {
            dir_path: vpath::versioned_dir(&dir_path, num),
            recursive,
        }))
    }

    fn post(&mut self, result: OpResult, _ctx: &OpContext) -> Result<OpResult> {
        // The raw listing already yields versioned views reporting plain
        // paths; keep only files from the versioned subtree.
        let OpResult::FileList(files) = result else {
            return Ok(result);
        };
        Ok(OpResult::FileList(
            files
                .into_iter()
                .filter(|file| matches!(file, File::Versioned { .. }))
                .collect(),
        ))
    }
}
