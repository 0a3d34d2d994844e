//! Hook pipeline over the primitive file operations.
//!
//! Services plug into the file service by registering a hook per operation.
//! Dispatch instantiates one hook object per call (so a hook can carry
//! state from `pre` to `post`), runs every `pre` in registration order,
//! performs the inner store call, then runs the `post` steps in reverse
//! registration order — an onion with the inner call at the center.
//!
//! A `pre` step either proceeds with (possibly rewritten) arguments or
//! short-circuits with a finished result. A short-circuit bypasses the
//! inner call *and* every remaining hook, `post` steps included: its value
//! is already in the caller's shape, and another service's `post` would
//! re-wrap it.
//!
//! The registry is an explicit object, not process-global state. Tests
//! build a fresh registry per case; embedders build one at startup.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::model::file::{BlobRef, File, MetaMap};
use crate::model::types::FilePath;
use crate::versions::changeset::Changeset;

// ---------------------------------------------------------------------------
// OpKind
// ---------------------------------------------------------------------------

/// The six hookable primitive operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// `exists(path)`
    Exists,
    /// `get(paths)`
    Get,
    /// `write(...)`
    Write,
    /// `touch(paths)`
    Touch,
    /// `delete(paths)`
    Delete,
    /// `list_files(dir)`
    ListFiles,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => write!(f, "file-exists"),
            Self::Get => write!(f, "file-get"),
            Self::Write => write!(f, "file-write"),
            Self::Touch => write!(f, "file-touch"),
            Self::Delete => write!(f, "file-delete"),
            Self::ListFiles => write!(f, "list-files"),
        }
    }
}

// ---------------------------------------------------------------------------
// Op arguments and results
// ---------------------------------------------------------------------------

/// Arguments of a `write` call.
#[derive(Clone, Debug)]
pub struct WriteOp {
    /// Destination path (plain from the caller; hooks may rewrite it).
    pub path: FilePath,
    /// New inline content.
    pub content: Option<String>,
    /// New blob reference.
    pub blob: Option<BlobRef>,
    /// Metadata keys to merge.
    pub meta: Option<MetaMap>,
    /// Delete flag: within a changeset, stage a delete tombstone instead
    /// of content.
    pub delete: bool,
    /// Who performed the write.
    pub created_by: Option<String>,
}

impl WriteOp {
    /// A plain content write to `path`.
    #[must_use]
    pub fn new(path: FilePath) -> Self {
        Self {
            path,
            content: None,
            blob: None,
            meta: None,
            delete: false,
            created_by: None,
        }
    }
}

/// Arguments of a primitive call, as seen and rewritten by hooks.
#[derive(Clone, Debug)]
pub enum OpArgs {
    /// `exists(path)`
    Exists {
        /// Path to probe.
        path: FilePath,
    },
    /// `get(paths)` — single-path gets are one-element batches.
    Get {
        /// Paths to fetch.
        paths: Vec<FilePath>,
    },
    /// `write(...)`
    Write(WriteOp),
    /// `touch(paths)`
    Touch {
        /// Paths to touch.
        paths: Vec<FilePath>,
        /// Metadata keys to merge.
        meta: Option<MetaMap>,
        /// Who performed the touch.
        created_by: Option<String>,
    },
    /// `delete(paths)`
    Delete {
        /// Paths to delete.
        paths: Vec<FilePath>,
    },
    /// `list_files(dir)`
    ListFiles {
        /// Directory to list.
        dir_path: FilePath,
        /// Whether to recurse.
        recursive: bool,
    },
}

impl OpArgs {
    /// The operation these arguments belong to.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Exists { .. } => OpKind::Exists,
            Self::Get { .. } => OpKind::Get,
            Self::Write(_) => OpKind::Write,
            Self::Touch { .. } => OpKind::Touch,
            Self::Delete { .. } => OpKind::Delete,
            Self::ListFiles { .. } => OpKind::ListFiles,
        }
    }
}

/// Result of a primitive call.
#[derive(Clone, Debug)]
pub enum OpResult {
    /// `exists`
    Bool(bool),
    /// `get` — files keyed by path (stored path until a post rekeys).
    Files(BTreeMap<FilePath, File>),
    /// `list_files`
    FileList(Vec<File>),
    /// `write` / `touch` / `delete`
    Unit,
}

/// Call-scoped context shared by every hook of one dispatch.
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    /// The changeset argument, if the caller passed one.
    pub changeset: Option<Changeset>,
}

/// What a `pre` step decided.
pub enum PreOutcome {
    /// Continue with these (possibly rewritten) arguments.
    Proceed(OpArgs),
    /// Skip the inner call and all remaining hooks; this is the result.
    ShortCircuit(OpResult),
}

// ---------------------------------------------------------------------------
// FileOpHook
// ---------------------------------------------------------------------------

/// One service's interceptor for one operation.
///
/// Instantiated per call; `pre` and `post` run on the same instance.
pub trait FileOpHook {
    /// Inspect and possibly rewrite the arguments, or short-circuit.
    ///
    /// # Errors
    /// Surface any validation failure; dispatch aborts the call.
    fn pre(&mut self, args: OpArgs, ctx: &OpContext) -> Result<PreOutcome>;

    /// Transform the inner result. Default: identity.
    ///
    /// # Errors
    /// Surface any transformation failure; dispatch aborts the call.
    fn post(&mut self, result: OpResult, ctx: &OpContext) -> Result<OpResult> {
        let _ = ctx;
        Ok(result)
    }
}

/// Factory producing a fresh hook instance per dispatched call.
pub type HookFactory = Arc<dyn Fn() -> Box<dyn FileOpHook> + Send + Sync>;

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

struct Registration {
    service: String,
    factory: HookFactory,
}

/// Ordered hook registrations per operation.
///
/// Composition order is registration order: the first-registered service's
/// `pre` runs first (outermost layer) and its `post` runs last.
#[derive(Default)]
pub struct ServiceRegistry {
    hooks: HashMap<OpKind, Vec<Registration>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service`'s hook for `op`.
    pub fn register(&mut self, op: OpKind, service: &str, factory: HookFactory) {
        self.hooks.entry(op).or_default().push(Registration {
            service: service.to_owned(),
            factory,
        });
    }

    /// Drop every registration. Tests call this between cases when they
    /// reuse a registry.
    pub fn reset(&mut self) {
        self.hooks.clear();
    }

    /// The services registered for `op`, in composition order.
    #[must_use]
    pub fn services_for(&self, op: OpKind) -> Vec<&str> {
        self.hooks
            .get(&op)
            .map(|regs| regs.iter().map(|r| r.service.as_str()).collect())
            .unwrap_or_default()
    }

    /// Instantiate fresh hook objects for one dispatch of `op`.
    pub(crate) fn instantiate(&self, op: OpKind) -> Vec<Box<dyn FileOpHook>> {
        self.hooks
            .get(&op)
            .map(|regs| regs.iter().map(|r| (r.factory)()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (op, regs) in &self.hooks {
            map.key(op).value(
                &regs
                    .iter()
                    .map(|r| r.service.as_str())
                    .collect::<Vec<_>>(),
            );
        }
        map.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
