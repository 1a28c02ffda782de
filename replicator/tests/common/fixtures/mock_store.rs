//! In-memory snapshot store
//!
//! Datasets are keyed by name; creation times come from a counter so snapshots
//! created later always sort after earlier ones.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use replicator::errors::SnapshotError;
use replicator::zfs::{SendStream, Snapshot, SnapshotStore};

const STREAM_BYTES: &[u8] = b"zfs-send-stream";

pub struct MockSnapshotStore {
    dataset: String,
    snapshots: Mutex<HashMap<String, Vec<Snapshot>>>,
    changed: Mutex<HashSet<String>>,
    opened_streams: Mutex<Vec<(Option<String>, String)>>,
    destroyed: Mutex<Vec<String>>,
    clock: AtomicI64,
    fail_create: AtomicBool,
    fail_list: AtomicBool,
}

impl MockSnapshotStore {
    pub fn new(dataset: &str) -> Self {
        let mut snapshots = HashMap::new();
        snapshots.insert(dataset.to_string(), Vec::new());

        Self {
            dataset: dataset.to_string(),
            snapshots: Mutex::new(snapshots),
            changed: Mutex::new(HashSet::new()),
            opened_streams: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
            clock: AtomicI64::new(1_700_000_000),
            fail_create: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
        }
    }

    /// Seed the managed dataset, oldest first
    pub fn with_snapshots(self, names: &[&str]) -> Self {
        for name in names {
            self.add_snapshot(&self.dataset.clone(), name);
        }
        self
    }

    /// Make `dataset` exist without any snapshots
    pub fn add_dataset(&self, dataset: &str) {
        self.snapshots
            .lock()
            .unwrap()
            .entry(dataset.to_string())
            .or_default();
    }

    pub fn add_snapshot(&self, dataset: &str, name: &str) {
        let created_at = Utc
            .timestamp_opt(self.clock.fetch_add(60, Ordering::SeqCst), 0)
            .unwrap();
        self.snapshots
            .lock()
            .unwrap()
            .entry(dataset.to_string())
            .or_default()
            .push(Snapshot {
                name: name.to_string(),
                dataset: dataset.to_string(),
                created_at,
                used_bytes: 1024,
                referenced_bytes: 4096,
            });
    }

    /// Remove a snapshot behind the scheduler's back
    pub fn remove_snapshot(&self, dataset: &str, name: &str) {
        if let Some(list) = self.snapshots.lock().unwrap().get_mut(dataset) {
            list.retain(|s| s.name != name);
        }
    }

    /// Mark `dataset` as modified since its latest snapshot
    pub fn set_changed(&self, dataset: &str, changed: bool) {
        let mut set = self.changed.lock().unwrap();
        if changed {
            set.insert(dataset.to_string());
        } else {
            set.remove(dataset);
        }
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot_names(&self) -> Vec<String> {
        self.snapshot_names_for(&self.dataset)
    }

    pub fn snapshot_names_for(&self, dataset: &str) -> Vec<String> {
        self.snapshots
            .lock()
            .unwrap()
            .get(dataset)
            .map(|list| list.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    /// `(base, snapshot)` for every stream opened
    pub fn opened_streams(&self) -> Vec<(Option<String>, String)> {
        self.opened_streams.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }

    fn has_snapshot(&self, name: &str) -> bool {
        self.snapshot_names().iter().any(|s| s == name)
    }
}

#[async_trait]
impl SnapshotStore for MockSnapshotStore {
    fn dataset(&self) -> &str {
        &self.dataset
    }

    async fn create_snapshot(&self, name: &str) -> Result<(), SnapshotError> {
        if self.fail_create.load(Ordering::SeqCst) || self.has_snapshot(name) {
            return Err(SnapshotError::Create {
                snapshot: format!("{}@{}", self.dataset, name),
                reason: "dataset is busy".to_string(),
            });
        }
        self.add_snapshot(&self.dataset.clone(), name);
        Ok(())
    }

    async fn list_snapshots_for(&self, dataset: &str) -> Result<Vec<Snapshot>, SnapshotError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(SnapshotError::Enumeration {
                dataset: dataset.to_string(),
                reason: "pool is suspended".to_string(),
            });
        }
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .get(dataset)
            .cloned()
            .unwrap_or_default())
    }

    async fn destroy_snapshot(&self, name: &str) -> Result<(), SnapshotError> {
        self.remove_snapshot(&self.dataset.clone(), name);
        self.destroyed.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn open_send_stream(&self, snapshot: &str) -> Result<SendStream, SnapshotError> {
        self.opened_streams
            .lock()
            .unwrap()
            .push((None, snapshot.to_string()));
        Ok(SendStream::from_reader(snapshot, None, Cursor::new(STREAM_BYTES.to_vec())))
    }

    async fn open_incremental_send_stream(
        &self,
        from: &str,
        to: &str,
    ) -> Result<SendStream, SnapshotError> {
        self.opened_streams
            .lock()
            .unwrap()
            .push((Some(from.to_string()), to.to_string()));
        Ok(SendStream::from_reader(
            to,
            Some(from.to_string()),
            Cursor::new(STREAM_BYTES.to_vec()),
        ))
    }

    async fn dataset_exists(&self, dataset: &str) -> Result<bool, SnapshotError> {
        Ok(self.snapshots.lock().unwrap().contains_key(dataset))
    }

    async fn has_changes_since(
        &self,
        dataset: &str,
        _snapshot: &str,
    ) -> Result<bool, SnapshotError> {
        Ok(self.changed.lock().unwrap().contains(dataset))
    }
}
