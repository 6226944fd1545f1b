//! Persistent work queue backed by a pluggable persister
//!
//! The persistence format is opaque to the core; a persister only has to
//! round-trip an ordered list of `(class_tag, input, timeout)` records.

use super::{QueueError, QueueResult, WorkQueue};
use crate::work::Work;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// One persisted queue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Work class tag (base work items use `"work"`)
    pub class_tag: String,

    /// Opaque input payload
    pub input: serde_json::Value,

    /// Per-item timeout (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl PersistedRecord {
    /// Record for a base work item
    pub fn from_work(work: &Work) -> Self {
        Self {
            class_tag: "work".to_string(),
            input: work.input().clone(),
            timeout_secs: work.timeout_secs(),
        }
    }

    /// Rebuild the work item. Unknown class tags are rejected.
    pub fn into_work(self) -> QueueResult<Work> {
        if self.class_tag != "work" {
            return Err(QueueError::InvalidWork(format!(
                "unknown work class tag '{}'",
                self.class_tag
            )));
        }
        let mut work = Work::new(self.input);
        if let Some(secs) = self.timeout_secs {
            work = work.with_timeout(std::time::Duration::from_secs(secs));
        }
        Ok(work)
    }
}

/// Pluggable queue persistence backend.
///
/// Implementations are interchangeable; the encoding is their choice as
/// long as records round-trip in order.
pub trait Persister: Send + Sync {
    /// Persist the full record list, replacing any previous snapshot
    fn save(&self, records: &[PersistedRecord]) -> QueueResult<()>;

    /// Load the last snapshot; `None` when nothing was saved yet
    fn load(&self) -> QueueResult<Option<Vec<PersistedRecord>>>;

    /// Remove the snapshot
    fn clear(&self) -> QueueResult<()>;
}

/// JSON file persister.
///
/// Writes the record list as a JSON array. JSON turns symbol-ish keys
/// into strings, so loaded payload objects always carry string keys.
pub struct JsonPersister {
    path: PathBuf,
}

impl JsonPersister {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persister for JsonPersister {
    fn save(&self, records: &[PersistedRecord]) -> QueueResult<()> {
        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| QueueError::Persistence(e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| QueueError::Persistence(e.to_string()))?;
        debug!("Persisted {} queue records to {:?}", records.len(), self.path);
        Ok(())
    }

    fn load(&self) -> QueueResult<Option<Vec<PersistedRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data =
            std::fs::read(&self.path).map_err(|e| QueueError::Persistence(e.to_string()))?;
        let records: Vec<PersistedRecord> =
            serde_json::from_slice(&data).map_err(|e| QueueError::Persistence(e.to_string()))?;
        Ok(Some(records))
    }

    fn clear(&self) -> QueueResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| QueueError::Persistence(e.to_string()))?;
        }
        Ok(())
    }
}

/// FIFO work queue that can snapshot itself through a [`Persister`].
///
/// Tracks a dirty flag; with `auto_save` every enqueue triggers a save,
/// and `close` flushes a dirty queue either way.
pub struct PersistentWorkQueue {
    queue: WorkQueue,
    persister: Box<dyn Persister>,
    dirty: AtomicBool,
    auto_save: bool,
}

impl PersistentWorkQueue {
    /// Open a persistent queue, restoring any previous snapshot
    pub fn open(persister: Box<dyn Persister>, auto_save: bool) -> QueueResult<Self> {
        let queue = WorkQueue::new();
        if let Some(records) = persister.load()? {
            let count = records.len();
            for record in records {
                queue.push(record.into_work()?);
            }
            info!("Restored {} work items from persister", count);
        }
        Ok(Self {
            queue,
            persister,
            dirty: AtomicBool::new(false),
            auto_save,
        })
    }

    /// Enqueue one work item
    pub fn push(&self, work: Work) -> QueueResult<()> {
        self.queue.push(work);
        self.dirty.store(true, Ordering::SeqCst);
        if self.auto_save {
            self.save()?;
        }
        Ok(())
    }

    /// Pop the oldest item
    pub fn pop(&self) -> Option<Work> {
        let work = self.queue.pop();
        if work.is_some() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        work
    }

    /// Pop up to `n` items, oldest first
    pub fn pop_batch(&self, n: usize) -> Vec<Work> {
        let batch = self.queue.pop_batch(n);
        if !batch.is_empty() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether unsaved changes exist
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Snapshot the queue through the persister
    pub fn save(&self) -> QueueResult<()> {
        let records: Vec<PersistedRecord> = self
            .queue
            .snapshot()
            .iter()
            .map(PersistedRecord::from_work)
            .collect();
        self.persister.save(&records)?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Drop all pending items and the snapshot
    pub fn clear(&self) -> QueueResult<()> {
        self.queue.clear();
        self.persister.clear()?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Flush if dirty. Call before dropping the queue.
    pub fn close(&self) -> QueueResult<()> {
        if self.is_dirty() {
            if let Err(e) = self.save() {
                warn!("Failed to flush persistent queue on close: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn temp_persister() -> (tempfile::TempDir, JsonPersister) {
        let dir = tempfile::tempdir().unwrap();
        let persister = JsonPersister::new(dir.path().join("queue.json"));
        (dir, persister)
    }

    #[test]
    fn test_record_round_trip() {
        let work = Work::new(json!({"url": "https://example.com"}))
            .with_timeout(Duration::from_secs(30));
        let record = PersistedRecord::from_work(&work);

        assert_eq!(record.class_tag, "work");
        assert_eq!(record.timeout_secs, Some(30));

        let restored = record.into_work().unwrap();
        assert_eq!(restored, work);
    }

    #[test]
    fn test_unknown_class_tag_rejected() {
        let record = PersistedRecord {
            class_tag: "mystery".to_string(),
            input: json!(null),
            timeout_secs: None,
        };
        assert!(matches!(
            record.into_work(),
            Err(QueueError::InvalidWork(_))
        ));
    }

    #[test]
    fn test_save_load_restores_sequence() {
        let (_dir, persister) = temp_persister();

        let records: Vec<PersistedRecord> = (0..5)
            .map(|i| PersistedRecord {
                class_tag: "work".to_string(),
                input: json!(i),
                timeout_secs: if i == 0 { Some(10) } else { None },
            })
            .collect();

        persister.save(&records).unwrap();
        let loaded = persister.load().unwrap().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let (_dir, persister) = temp_persister();
        assert!(persister.load().unwrap().is_none());
    }

    #[test]
    fn test_persistent_queue_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        {
            let queue =
                PersistentWorkQueue::open(Box::new(JsonPersister::new(&path)), false).unwrap();
            queue.push(Work::new(json!("a"))).unwrap();
            queue.push(Work::new(json!("b"))).unwrap();
            queue.close().unwrap();
        }

        let queue =
            PersistentWorkQueue::open(Box::new(JsonPersister::new(&path)), false).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().input(), &json!("a"));
        assert_eq!(queue.pop().unwrap().input(), &json!("b"));
    }

    #[test]
    fn test_auto_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let queue = PersistentWorkQueue::open(Box::new(JsonPersister::new(&path)), true).unwrap();
        queue.push(Work::new(json!(1))).unwrap();

        // Saved on every enqueue, so the snapshot is already on disk
        assert!(!queue.is_dirty());
        let loaded = JsonPersister::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let queue = PersistentWorkQueue::open(Box::new(JsonPersister::new(&path)), true).unwrap();
        queue.push(Work::new(json!(1))).unwrap();
        queue.clear().unwrap();

        assert!(queue.is_empty());
        assert!(JsonPersister::new(&path).load().unwrap().is_none());
    }
}
