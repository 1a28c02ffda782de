// File: replicator/src/zfs/store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::{sort_by_creation, SendStream, Snapshot, SnapshotStore};
use crate::commands::{describe, run_command, spawn_producer};
use crate::config::ZfsConfig;
use crate::errors::SnapshotError;

const ZFS: &str = "zfs";

/// Snapshot store backed by the `zfs` CLI
pub struct ZfsSnapshotStore {
    dataset: String,
    compressed_send: bool,
    recursive: bool,
}

impl ZfsSnapshotStore {
    pub fn new(config: &ZfsConfig) -> Self {
        Self {
            dataset: config.dataset.clone(),
            compressed_send: !config.send_compression.trim().is_empty(),
            recursive: config.recursive,
        }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}@{}", self.dataset, name)
    }

    fn send_args(&self, from: Option<&str>, to: &str) -> Vec<String> {
        let mut args = vec!["send".to_string()];
        if self.compressed_send {
            args.push("-c".to_string());
        }
        if self.recursive {
            args.push("-R".to_string());
        }
        if let Some(from) = from {
            args.push("-i".to_string());
            args.push(self.qualified(from));
        }
        args.push(self.qualified(to));
        args
    }

    fn spawn_send(
        &self,
        from: Option<&str>,
        to: &str,
    ) -> Result<SendStream, SnapshotError> {
        let args = self.send_args(from, to);
        info!("Opening send stream: {}", describe(ZFS, &args));

        let child = spawn_producer(ZFS, &args).map_err(|e| SnapshotError::StreamOpen {
            snapshot: to.to_string(),
            reason: e.reason(),
        })?;

        SendStream::from_child(to, from.map(str::to_string), child)
    }
}

#[async_trait]
impl SnapshotStore for ZfsSnapshotStore {
    fn dataset(&self) -> &str {
        &self.dataset
    }

    #[instrument(skip(self))]
    async fn create_snapshot(&self, name: &str) -> Result<(), SnapshotError> {
        let mut args = vec!["snapshot".to_string()];
        if self.recursive {
            args.push("-r".to_string());
        }
        args.push(self.qualified(name));

        run_command(ZFS, &args)
            .await
            .map_err(|e| SnapshotError::Create {
                snapshot: name.to_string(),
                reason: e.reason(),
            })?;

        info!("Created snapshot {}", self.qualified(name));
        Ok(())
    }

    async fn list_snapshots_for(&self, dataset: &str) -> Result<Vec<Snapshot>, SnapshotError> {
        let args: Vec<String> = [
            "list", "-t", "snapshot", "-H", "-p", "-o", "name,creation,used,refer", "-s",
            "creation", "-d", "1", dataset,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let output = run_command(ZFS, &args)
            .await
            .map_err(|e| SnapshotError::Enumeration {
                dataset: dataset.to_string(),
                reason: e.reason(),
            })?;

        let mut snapshots =
            parse_snapshot_list(&output).map_err(|reason| SnapshotError::Enumeration {
                dataset: dataset.to_string(),
                reason,
            })?;
        sort_by_creation(&mut snapshots);

        debug!("Found {} snapshots of {}", snapshots.len(), dataset);
        Ok(snapshots)
    }

    async fn destroy_snapshot(&self, name: &str) -> Result<(), SnapshotError> {
        let args = vec!["destroy".to_string(), self.qualified(name)];
        run_command(ZFS, &args)
            .await
            .map_err(|e| SnapshotError::Destroy {
                snapshot: name.to_string(),
                reason: e.reason(),
            })?;

        info!("Destroyed snapshot {}", self.qualified(name));
        Ok(())
    }

    async fn open_send_stream(&self, snapshot: &str) -> Result<SendStream, SnapshotError> {
        self.spawn_send(None, snapshot)
    }

    async fn open_incremental_send_stream(
        &self,
        from: &str,
        to: &str,
    ) -> Result<SendStream, SnapshotError> {
        self.spawn_send(Some(from), to)
    }

    async fn dataset_exists(&self, dataset: &str) -> Result<bool, SnapshotError> {
        let args = vec![
            "list".to_string(),
            "-H".to_string(),
            "-o".to_string(),
            "name".to_string(),
            dataset.to_string(),
        ];

        match run_command(ZFS, &args).await {
            Ok(_) => Ok(true),
            Err(e) if e.stderr.contains("does not exist") => Ok(false),
            Err(e) => Err(SnapshotError::Command {
                command: e.command.clone(),
                reason: e.reason(),
            }),
        }
    }

    async fn has_changes_since(
        &self,
        dataset: &str,
        snapshot: &str,
    ) -> Result<bool, SnapshotError> {
        let target = format!("{}@{}", dataset, snapshot);
        let args = vec!["diff".to_string(), target.clone()];

        let output = run_command(ZFS, &args)
            .await
            .map_err(|e| SnapshotError::Diff {
                snapshot: target,
                reason: e.reason(),
            })?;

        Ok(!output.trim().is_empty())
    }
}

/// Parse `zfs list -H -p -o name,creation,used,refer` output
pub fn parse_snapshot_list(output: &str) -> Result<Vec<Snapshot>, String> {
    let mut snapshots = Vec::new();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 {
            return Err(format!("unexpected zfs list line: '{}'", line));
        }

        let Some((dataset, name)) = fields[0].split_once('@') else {
            return Err(format!("not a snapshot name: '{}'", fields[0]));
        };

        let created_secs: i64 = fields[1]
            .trim()
            .parse()
            .map_err(|_| format!("invalid creation time '{}' for {}", fields[1], fields[0]))?;
        let created_at = DateTime::<Utc>::from_timestamp(created_secs, 0)
            .ok_or_else(|| format!("creation time out of range for {}", fields[0]))?;

        snapshots.push(Snapshot {
            name: name.to_string(),
            dataset: dataset.to_string(),
            created_at,
            used_bytes: fields[2].trim().parse().unwrap_or(0),
            referenced_bytes: fields[3].trim().parse().unwrap_or(0),
        });
    }

    Ok(snapshots)
}
