//! Scriptable transport
//!
//! Sends can be held open until released, so tests can observe the scheduler
//! while a transfer is in flight. Successful sends append the snapshot to the
//! remote dataset; successful restores append it to the attached local store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;

use super::mock_store::MockSnapshotStore;
use super::test_data::hosts;
use replicator::errors::TransportError;
use replicator::transport::Transport;
use replicator::zfs::SendStream;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSend {
    pub snapshot: String,
    pub base: Option<String>,
    pub incremental: bool,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRestore {
    pub source_dataset: String,
    pub snapshot: String,
    pub target_dataset: String,
    pub force_overwrite: bool,
}

pub struct MockTransport {
    remote_dataset: String,
    remote: Mutex<HashMap<String, Vec<String>>>,
    sends: Mutex<Vec<RecordedSend>>,
    restores: Mutex<Vec<RecordedRestore>>,
    local_store: Mutex<Option<Arc<MockSnapshotStore>>>,
    fail_list: AtomicBool,
    fail_send: AtomicBool,
    fail_restore: AtomicBool,
    panic_on_restore: AtomicBool,
    hold_sends: AtomicBool,
    send_started: Notify,
    release: Notify,
    hold_restores: AtomicBool,
    restore_started: Notify,
    restore_release: Notify,
    list_calls: AtomicUsize,
    closed: AtomicUsize,
}

impl MockTransport {
    pub fn new(remote_dataset: &str) -> Self {
        let mut remote = HashMap::new();
        remote.insert(remote_dataset.to_string(), Vec::new());

        Self {
            remote_dataset: remote_dataset.to_string(),
            remote: Mutex::new(remote),
            sends: Mutex::new(Vec::new()),
            restores: Mutex::new(Vec::new()),
            local_store: Mutex::new(None),
            fail_list: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_restore: AtomicBool::new(false),
            panic_on_restore: AtomicBool::new(false),
            hold_sends: AtomicBool::new(false),
            send_started: Notify::new(),
            release: Notify::new(),
            hold_restores: AtomicBool::new(false),
            restore_started: Notify::new(),
            restore_release: Notify::new(),
            list_calls: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn with_remote_snapshots(self, names: &[&str]) -> Self {
        self.set_remote_snapshots(&self.remote_dataset.clone(), names);
        self
    }

    pub fn set_remote_snapshots(&self, dataset: &str, names: &[&str]) {
        self.remote.lock().unwrap().insert(
            dataset.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
    }

    /// Restored snapshots land in this store
    pub fn attach_local_store(&self, store: Arc<MockSnapshotStore>) {
        *self.local_store.lock().unwrap() = Some(store);
    }

    pub fn remote_snapshot_names(&self) -> Vec<String> {
        self.remote
            .lock()
            .unwrap()
            .get(&self.remote_dataset)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_restore(&self, fail: bool) {
        self.fail_restore.store(fail, Ordering::SeqCst);
    }

    pub fn set_panic_on_restore(&self, panic: bool) {
        self.panic_on_restore.store(panic, Ordering::SeqCst);
    }

    /// Park every send until `release_sends` is called
    pub fn hold_sends(&self) {
        self.hold_sends.store(true, Ordering::SeqCst);
    }

    pub fn release_sends(&self) {
        self.hold_sends.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    /// Resolves once a send has reached the transport
    pub async fn wait_for_send_started(&self) {
        self.send_started.notified().await;
    }

    /// Park every restore transfer until `release_restores` is called
    pub fn hold_restores(&self) {
        self.hold_restores.store(true, Ordering::SeqCst);
    }

    pub fn release_restores(&self) {
        self.hold_restores.store(false, Ordering::SeqCst);
        self.restore_release.notify_one();
    }

    /// Resolves once a restore transfer has reached the transport
    pub async fn wait_for_restore_started(&self) {
        self.restore_started.notified().await;
    }

    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().unwrap().clone()
    }

    pub fn restores(&self) -> Vec<RecordedRestore> {
        self.restores.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn connection_error(&self) -> TransportError {
        TransportError::ConnectionFailed {
            host: hosts::BACKUP.to_string(),
            reason: "ssh: connect to host: Connection refused".to_string(),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_stream(
        &self,
        stream: &mut SendStream,
        incremental: bool,
    ) -> Result<(), TransportError> {
        self.send_started.notify_one();
        if self.hold_sends.load(Ordering::SeqCst) {
            self.release.notified().await;
        }

        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::RemoteCommandFailed {
                host: hosts::BACKUP.to_string(),
                operation: "zfs receive".to_string(),
                reason: "cannot receive: destination has been modified".to_string(),
            });
        }

        let mut buf = Vec::new();
        stream
            .reader_mut()
            .read_to_end(&mut buf)
            .await
            .map_err(|e| TransportError::Io {
                operation: "send".to_string(),
                reason: e.to_string(),
            })?;

        self.sends.lock().unwrap().push(RecordedSend {
            snapshot: stream.snapshot().to_string(),
            base: stream.base().map(str::to_string),
            incremental,
            bytes: buf.len(),
        });
        self.remote
            .lock()
            .unwrap()
            .entry(self.remote_dataset.clone())
            .or_default()
            .push(stream.snapshot().to_string());

        Ok(())
    }

    async fn list_remote_snapshot_names(
        &self,
        dataset: &str,
    ) -> Result<Vec<String>, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(self.connection_error());
        }
        Ok(self
            .remote
            .lock()
            .unwrap()
            .get(dataset)
            .cloned()
            .unwrap_or_default())
    }

    async fn restore_from_remote(
        &self,
        source_dataset: &str,
        snapshot: &str,
        target_dataset: &str,
        force_overwrite: bool,
    ) -> Result<(), TransportError> {
        if self.panic_on_restore.load(Ordering::SeqCst) {
            panic!("receive pipe exploded");
        }

        self.restore_started.notify_one();
        if self.hold_restores.load(Ordering::SeqCst) {
            self.restore_release.notified().await;
        }

        self.restores.lock().unwrap().push(RecordedRestore {
            source_dataset: source_dataset.to_string(),
            snapshot: snapshot.to_string(),
            target_dataset: target_dataset.to_string(),
            force_overwrite,
        });

        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(TransportError::Io {
                operation: "local zfs receive".to_string(),
                reason: "cannot receive new filesystem stream: destination exists".to_string(),
            });
        }

        let store = self.local_store.lock().unwrap().clone();
        if let Some(store) = store {
            store.add_snapshot(target_dataset, snapshot);
        }
        Ok(())
    }

    async fn list_remote_datasets(&self) -> Result<Vec<String>, TransportError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(self.connection_error());
        }
        let mut datasets: Vec<String> = self.remote.lock().unwrap().keys().cloned().collect();
        datasets.sort();
        Ok(datasets)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
