// File: replicator/src/zfs/stream.rs
use std::fmt;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::errors::SnapshotError;

pub type StreamReader = Box<dyn AsyncRead + Send + Unpin>;

/// Serialized snapshot (or snapshot delta) being produced for a transfer
///
/// Must be finished or aborted once the consumer is done with it. The producing
/// process is spawned `kill_on_drop`, so dropping an unfinished stream also
/// terminates the producer.
pub struct SendStream {
    snapshot: String,
    base: Option<String>,
    reader: StreamReader,
    producer: Option<Child>,
}

impl SendStream {
    /// Stream backed by an in-process reader
    pub fn from_reader<R>(snapshot: impl Into<String>, base: Option<String>, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            snapshot: snapshot.into(),
            base,
            reader: Box::new(reader),
            producer: None,
        }
    }

    /// Stream backed by the stdout of a spawned `zfs send`
    pub fn from_child(
        snapshot: impl Into<String>,
        base: Option<String>,
        mut child: Child,
    ) -> Result<Self, SnapshotError> {
        let snapshot = snapshot.into();
        let stdout = child.stdout.take().ok_or_else(|| SnapshotError::StreamOpen {
            snapshot: snapshot.clone(),
            reason: "producer stdout was not captured".to_string(),
        })?;

        Ok(Self {
            snapshot,
            base,
            reader: Box::new(stdout),
            producer: Some(child),
        })
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn is_incremental(&self) -> bool {
        self.base.is_some()
    }

    pub fn reader_mut(&mut self) -> &mut StreamReader {
        &mut self.reader
    }

    /// Wait for the producer and report an abnormal exit
    pub async fn finish(self) -> Result<(), SnapshotError> {
        let Some(child) = self.producer else {
            return Ok(());
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SnapshotError::StreamFailed {
                snapshot: self.snapshot.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            debug!("Send stream producer for {} exited cleanly", self.snapshot);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("producer exited with {}", output.status)
        } else {
            stderr
        };

        Err(SnapshotError::StreamFailed {
            snapshot: self.snapshot,
            reason,
        })
    }

    /// Kill the producer without waiting for its output
    pub async fn abort(self) {
        if let Some(mut child) = self.producer {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill send stream producer for {}: {}", self.snapshot, e);
            }
        }
    }
}

impl fmt::Debug for SendStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendStream")
            .field("snapshot", &self.snapshot)
            .field("base", &self.base)
            .field("has_producer", &self.producer.is_some())
            .finish()
    }
}
