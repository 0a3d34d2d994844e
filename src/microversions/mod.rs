//! Microversions: autosnapshot every write as a one-file commit.
//!
//! The service layers *above* the versioning hooks (registered first, so
//! its `pre` steps run first):
//!
//! - Reads without a changeset pass straight through to the root tree,
//!   bypassing the versioning pointer short-circuits. Readers always see
//!   the latest synchronous write, commit state notwithstanding.
//! - Writes, touches, and deletes without a changeset are applied to the
//!   root tree synchronously, then recorded on the work queue. The
//!   deferred consumer replays each record as `new staging → apply inside
//!   the changeset → commit`, so history catches up asynchronously while
//!   the root tree stays the hot path.
//!
//! Operations *with* a changeset pass through untouched — explicit
//! versioning keeps working alongside.

pub mod queue;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use anyhow::Context as _;
use crossbeam_channel::{Sender, bounded, select};

use crate::error::Result;
use crate::files::FileService;
use crate::hooks::{
    FileOpHook, OpArgs, OpContext, OpKind, OpResult, PreOutcome, ServiceRegistry, WriteOp,
};
use crate::model::file::{File, FileRecord};
use crate::store::{FileStore, WriteRequest};
use crate::versions::changeset::Changeset;
use crate::versions::service::VersionControlService;

pub use queue::{MicroversionTask, TaskQueue};

/// Registry name of the microversions service.
pub const SERVICE_NAME: &str = "microversions";

/// Register the microversion hooks. Call *before* registering the
/// versioning service so these run as the outer layer.
pub fn register(
    registry: &mut ServiceRegistry,
    store: &Arc<dyn FileStore>,
    queue: &Arc<TaskQueue>,
) {
    for op in [OpKind::Exists, OpKind::Get, OpKind::ListFiles] {
        let store = Arc::clone(store);
        registry.register(
            op,
            SERVICE_NAME,
            Arc::new(move || {
                Box::new(PassThroughReads {
                    store: Arc::clone(&store),
                })
            }),
        );
    }
    for op in [OpKind::Write, OpKind::Touch, OpKind::Delete] {
        let store = Arc::clone(store);
        let queue = Arc::clone(queue);
        registry.register(
            op,
            SERVICE_NAME,
            Arc::new(move || {
                Box::new(ForwardWrites {
                    store: Arc::clone(&store),
                    queue: Arc::clone(&queue),
                })
            }),
        );
    }
}

// ---------------------------------------------------------------------------
// Read hooks — root-tree pass-through
// ---------------------------------------------------------------------------

struct PassThroughReads {
    store: Arc<dyn FileStore>,
}

impl PassThroughReads {
    fn materialize(&self, mut record: FileRecord) -> Result<File> {
        if record.content.is_empty() {
            if let Some(blob) = record.blob.clone() {
                record.content = self.store.read_blob(&blob)?;
            }
        }
        Ok(File::from_stored(record))
    }
}

impl FileOpHook for PassThroughReads {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        if ctx.changeset.is_some() {
            return Ok(PreOutcome::Proceed(args));
        }
        match args {
            OpArgs::Exists { path } => Ok(PreOutcome::ShortCircuit(OpResult::Bool(
                self.store.exists(&path)?,
            ))),
            OpArgs::Get { paths } => {
                let records = self.store.get(&paths)?;
                let mut files = BTreeMap::new();
                for (path, record) in records {
                    files.insert(path, self.materialize(record)?);
                }
                Ok(PreOutcome::ShortCircuit(OpResult::Files(files)))
            }
            OpArgs::ListFiles {
                dir_path,
                recursive,
            } => {
                let records = self.store.list_files(&dir_path, recursive)?;
                let mut files = Vec::with_capacity(records.len());
                for record in records {
                    files.push(self.materialize(record)?);
                }
                Ok(PreOutcome::ShortCircuit(OpResult::FileList(files)))
            }
            other => Ok(PreOutcome::Proceed(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Write hooks — synchronous root write plus deferred snapshot
// ---------------------------------------------------------------------------

struct ForwardWrites {
    store: Arc<dyn FileStore>,
    queue: Arc<TaskQueue>,
}

impl FileOpHook for ForwardWrites {
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome> {
        if ctx.changeset.is_some() {
            return Ok(PreOutcome::Proceed(args));
        }
        match args {
            OpArgs::Write(op) if op.delete => {
                // Delete-flagged writes without a changeset are deletes.
                self.store.delete(std::slice::from_ref(&op.path))?;
                self.queue.enqueue(&MicroversionTask::Delete {
                    paths: vec![op.path],
                    created_by: op.created_by,
                });
                Ok(PreOutcome::ShortCircuit(OpResult::Unit))
            }
            OpArgs::Write(op) => {
                self.store.write(WriteRequest {
                    path: op.path.clone(),
                    content: op.content.clone(),
                    blob: op.blob.clone(),
                    meta: op.meta.clone(),
                    modified_by: op.created_by.clone(),
                })?;
                self.queue.enqueue(&MicroversionTask::Write {
                    path: op.path,
                    content: op.content,
                    blob: op.blob,
                    meta: op.meta,
                    created_by: op.created_by,
                });
                Ok(PreOutcome::ShortCircuit(OpResult::Unit))
            }
            OpArgs::Touch {
                paths,
                meta,
                created_by,
            } => {
                self.store
                    .touch(&paths, meta.as_ref(), created_by.as_deref())?;
                self.queue.enqueue(&MicroversionTask::Touch {
                    paths,
                    meta,
                    created_by,
                });
                Ok(PreOutcome::ShortCircuit(OpResult::Unit))
            }
            OpArgs::Delete { paths } => {
                self.store.delete(&paths)?;
                self.queue.enqueue(&MicroversionTask::Delete {
                    paths,
                    created_by: None,
                });
                Ok(PreOutcome::ShortCircuit(OpResult::Unit))
            }
            other => Ok(PreOutcome::Proceed(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// MicroversionEngine
// ---------------------------------------------------------------------------

/// Executes recorded tasks as one-file commits.
#[derive(Clone)]
pub struct MicroversionEngine {
    vcs: VersionControlService,
    queue: Arc<TaskQueue>,
}

impl MicroversionEngine {
    /// Create an engine over the version-control service and its queue.
    #[must_use]
    pub fn new(vcs: VersionControlService, queue: Arc<TaskQueue>) -> Self {
        Self { vcs, queue }
    }

    /// The work queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Execute every queued task synchronously; returns how many ran.
    ///
    /// Tests drain the queue this way instead of spinning up a worker.
    ///
    /// # Errors
    /// Stops at the first failing task.
    pub fn drain_pending(&self) -> Result<usize> {
        let mut ran = 0;
        while let Some(task) = self.queue.try_dequeue() {
            self.commit_microversion(&task)?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Replay one recorded mutation as a single-file changeset.
    ///
    /// `new staging → apply inside the changeset → commit` with a sealed
    /// manifest, so microversion commits never depend on query consistency.
    ///
    /// # Errors
    /// Propagates write and commit failures; the caller (worker or
    /// drainer) decides whether to retry.
    pub fn commit_microversion(&self, task: &MicroversionTask) -> Result<Changeset> {
        let files: &FileService = self.vcs.files();
        let created_by = task.created_by().map(str::to_owned);
        let mut staging = self.vcs.new_staging_changeset(created_by.clone())?;

        match task {
            MicroversionTask::Write {
                path,
                content,
                blob,
                meta,
                ..
            } => {
                let mut op = WriteOp::new(path.clone());
                op.content = content.clone();
                op.blob = blob.clone();
                op.meta = meta.clone();
                op.created_by = created_by;
                files.write(op, Some(&staging))?;
                staging.associate_file(path.clone());
            }
            MicroversionTask::Touch { paths, meta, .. } => {
                files.touch(paths.clone(), meta.clone(), created_by, Some(&staging))?;
                for path in paths {
                    staging.associate_file(path.clone());
                }
            }
            MicroversionTask::Delete { paths, .. } => {
                // Deletes must not depend on the root file still existing
                // by the time the task runs: stage tombstones directly.
                for path in paths {
                    let mut op = WriteOp::new(path.clone());
                    op.delete = true;
                    op.created_by = created_by.clone();
                    files.write(op, Some(&staging))?;
                    staging.associate_file(path.clone());
                }
            }
        }

        staging.finalize_associated_files();
        self.vcs.commit(&staging, false)
    }

    /// Spawn a blocking consumer thread.
    ///
    /// Failed tasks are logged and skipped — the queue's retry policy is
    /// the operator's concern, not the worker's.
    #[must_use]
    pub fn spawn_worker(&self) -> WorkerHandle {
        let engine = self.clone();
        let rx = self.queue.receiver();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            loop {
                select! {
                    recv(rx) -> payload => match payload {
                        Ok(payload) => {
                            if let Err(error) = engine.execute_payload(&payload) {
                                tracing::warn!(%error, "microversion task failed");
                            }
                        }
                        Err(_) => break,
                    },
                    recv(stop_rx) -> _msg => break,
                }
            }
        });
        WorkerHandle { stop_tx, handle }
    }

    /// Worker boundary: heterogeneous parse/commit failures fold into one
    /// loggable error.
    fn execute_payload(&self, payload: &str) -> anyhow::Result<()> {
        let task: MicroversionTask =
            serde_json::from_str(payload).context("unparseable microversion task payload")?;
        self.commit_microversion(&task)
            .map_err(|e| anyhow::anyhow!(e))
            .context("microversion commit failed")?;
        Ok(())
    }
}

/// Handle to a running worker thread.
pub struct WorkerHandle {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to stop and wait for it.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}
