//! The microversions work queue.
//!
//! Writes against the root tree enqueue a serialized [`MicroversionTask`];
//! a stateless consumer turns each task into a one-file commit. The queue
//! is an unbounded channel of JSON payloads — serializing at enqueue time
//! is what makes the payload limit enforceable and the task contents
//! immutable from the moment of capture (a blob reference recorded here
//! stays recorded, no matter what happens to the root tree before the
//! task runs).
//!
//! A task whose payload exceeds the limit is dropped with a warning. The
//! root-tree write it was recorded for has already happened; only the
//! history entry is lost. (Replacing the drop with blob indirection is a
//! known follow-up, not implemented.)

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::model::file::{BlobRef, MetaMap};
use crate::model::types::FilePath;

// ---------------------------------------------------------------------------
// MicroversionTask
// ---------------------------------------------------------------------------

/// One recorded root-tree mutation, captured at enqueue time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MicroversionTask {
    /// A content and/or metadata write.
    Write {
        /// The written path.
        path: FilePath,
        /// Inline content, if the write carried any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Blob reference as of enqueue time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blob: Option<BlobRef>,
        /// Metadata keys, if the write carried any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<MetaMap>,
        /// Who performed the write.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_by: Option<String>,
    },
    /// A touch of one or more paths.
    Touch {
        /// The touched paths.
        paths: Vec<FilePath>,
        /// Metadata keys, if the touch carried any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<MetaMap>,
        /// Who performed the touch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_by: Option<String>,
    },
    /// A delete of one or more paths.
    Delete {
        /// The deleted paths.
        paths: Vec<FilePath>,
        /// Who performed the delete.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_by: Option<String>,
    },
}

impl MicroversionTask {
    /// The user recorded on the task, if any.
    #[must_use]
    pub fn created_by(&self) -> Option<&str> {
        match self {
            Self::Write { created_by, .. }
            | Self::Touch { created_by, .. }
            | Self::Delete { created_by, .. } => created_by.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

/// Unbounded queue of serialized microversion tasks.
pub struct TaskQueue {
    tx: Sender<String>,
    rx: Receiver<String>,
    payload_limit: usize,
    dropped: AtomicU64,
}

impl TaskQueue {
    /// Create a queue that drops payloads larger than `payload_limit` bytes.
    #[must_use]
    pub fn new(payload_limit: usize) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            payload_limit,
            dropped: AtomicU64::new(0),
        }
    }

    /// Serialize and enqueue a task. Returns whether it was accepted.
    pub fn enqueue(&self, task: &MicroversionTask) -> bool {
        let payload = match serde_json::to_string(task) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize microversion task");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        if payload.len() > self.payload_limit {
            tracing::warn!(
                size = payload.len(),
                limit = self.payload_limit,
                "dropping oversized microversion task"
            );
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        // The receiver half lives in the queue; send cannot fail.
        let _ = self.tx.send(payload);
        true
    }

    /// Pop one task if any is queued.
    #[must_use]
    pub fn try_dequeue(&self) -> Option<MicroversionTask> {
        loop {
            let payload = self.rx.try_recv().ok()?;
            match serde_json::from_str(&payload) {
                Ok(task) => return Some(task),
                Err(error) => {
                    tracing::warn!(%error, "skipping unparseable microversion task");
                }
            }
        }
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Number of tasks dropped for size or serialization failures.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// A receiver handle for a blocking consumer.
    pub(crate) fn receiver(&self) -> Receiver<String> {
        self.rx.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn write_task(path: &str, content: &str) -> MicroversionTask {
        MicroversionTask::Write {
            path: FilePath::new(path).unwrap(),
            content: Some(content.to_owned()),
            blob: None,
            meta: None,
            created_by: Some("me".into()),
        }
    }

    #[test]
    fn enqueue_dequeue_round_trip() {
        let queue = TaskQueue::new(1 << 20);
        let task = write_task("/a", "hello");
        assert!(queue.enqueue(&task));
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.try_dequeue(), Some(task));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn oversized_payloads_are_dropped() {
        let queue = TaskQueue::new(64);
        let task = write_task("/a", &"x".repeat(1024));
        assert!(!queue.enqueue(&task));
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn task_json_carries_op_tag() {
        let task = MicroversionTask::Delete {
            paths: vec![FilePath::new("/a").unwrap()],
            created_by: None,
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"op\":\"delete\""), "json: {json}");
    }
}
