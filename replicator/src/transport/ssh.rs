// File: replicator/src/transport/ssh.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::Transport;
use crate::commands::{run_command, spawn_consumer, spawn_producer, CommandFailure};
use crate::config::SshConfig;
use crate::constants::transport::{MBUFFER_BLOCK_SIZE, SSH_CLIENT_FAILURE_STATUS};
use crate::errors::TransportError;
use crate::validation::shell_quote;
use crate::zfs::SendStream;

const SSH: &str = "ssh";

#[derive(Debug, Clone)]
struct SshSession {
    established_at: DateTime<Utc>,
}

/// Transport over the system OpenSSH client, multiplexed through a control master
pub struct SshTransport {
    host: String,
    port: Option<u16>,
    user: String,
    private_key: String,
    remote_dataset: String,
    mbuffer_size: String,
    connect_timeout: Duration,
    control_path: PathBuf,
    session: Mutex<Option<SshSession>>,
}

impl SshTransport {
    pub fn new(config: &SshConfig) -> Self {
        let (host, port) = split_host_port(&config.remote_host);
        let control_path = std::env::temp_dir().join(format!(
            "replicator-ssh-{}",
            &Uuid::new_v4().simple().to_string()[..8]
        ));

        Self {
            host,
            port,
            user: config.remote_user.clone(),
            private_key: config.private_key.clone(),
            remote_dataset: config.remote_dataset.clone(),
            mbuffer_size: config.mbuffer_size.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            control_path,
            session: Mutex::new(None),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            self.private_key.clone(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
        ];
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args
    }

    fn remote_args(&self, command: String) -> Vec<String> {
        let mut args = self.base_args();
        args.push(self.destination());
        args.push("--".to_string());
        args.push(command);
        args
    }

    /// Start the control master unless one is already up
    async fn ensure_connected(&self) -> Result<(), TransportError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        let mut args = self.base_args();
        args.extend([
            "-o".to_string(),
            "ControlMaster=yes".to_string(),
            "-o".to_string(),
            "ControlPersist=yes".to_string(),
            "-fN".to_string(),
            self.destination(),
        ]);

        info!("Connecting to {} (timeout {:?})", self.destination(), self.connect_timeout);

        match timeout(self.connect_timeout, run_command(SSH, &args)).await {
            Ok(Ok(_)) => {
                *session = Some(SshSession {
                    established_at: Utc::now(),
                });
                info!("SSH control master established to {}", self.host);
                Ok(())
            }
            Ok(Err(e)) => Err(classify_connect_failure(&self.host, &e)),
            Err(_) => Err(TransportError::Timeout {
                host: self.host.clone(),
                operation: "connecting".to_string(),
            }),
        }
    }

    /// Drop the cached session so the next call reconnects
    async fn reset_session(&self) {
        let mut session = self.session.lock().await;
        if let Some(stale) = session.take() {
            warn!(
                "Dropping SSH session to {} established at {}",
                self.host, stale.established_at
            );
        }
    }

    /// Map a failed ssh invocation, resetting the session on ssh-level failures
    async fn map_remote_failure(&self, operation: &str, failure: &CommandFailure) -> TransportError {
        if failure.status == Some(SSH_CLIENT_FAILURE_STATUS) || failure.status.is_none() {
            self.reset_session().await;
            return classify_connect_failure(&self.host, failure);
        }

        TransportError::RemoteCommandFailed {
            host: self.host.clone(),
            operation: operation.to_string(),
            reason: failure.reason(),
        }
    }

    async fn run_remote(&self, operation: &str, command: String) -> Result<String, TransportError> {
        self.ensure_connected().await?;
        debug!("Remote {} on {}: {}", operation, self.host, command);

        match run_command(SSH, &self.remote_args(command)).await {
            Ok(output) => Ok(output),
            Err(e) => Err(self.map_remote_failure(operation, &e).await),
        }
    }
}

#[async_trait]
impl Transport for SshTransport {
    #[instrument(skip(self, stream), fields(snapshot = %stream.snapshot()))]
    async fn send_stream(
        &self,
        stream: &mut SendStream,
        incremental: bool,
    ) -> Result<(), TransportError> {
        self.ensure_connected().await?;

        let receive = format!(
            "mbuffer -q -s {} -m {} | zfs receive -F {}",
            MBUFFER_BLOCK_SIZE,
            shell_quote(&self.mbuffer_size),
            shell_quote(&self.remote_dataset)
        );
        info!(
            "Sending {} stream of {} to {}:{}",
            if incremental { "incremental" } else { "full" },
            stream.snapshot(),
            self.host,
            self.remote_dataset
        );

        let mut child = spawn_consumer(SSH, &self.remote_args(receive)).map_err(|e| {
            TransportError::Io {
                operation: "spawning ssh receiver".to_string(),
                reason: e.reason(),
            }
        })?;

        let mut stdin = child.stdin.take().ok_or_else(|| TransportError::Io {
            operation: "opening ssh stdin".to_string(),
            reason: "stdin was not captured".to_string(),
        })?;

        let copied = tokio::io::copy(stream.reader_mut(), &mut stdin).await;
        let shutdown = stdin.shutdown().await;
        drop(stdin);

        let output = child.wait_with_output().await.map_err(|e| TransportError::Io {
            operation: "waiting for ssh receiver".to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let failure = CommandFailure {
                command: format!("ssh {} zfs receive", self.destination()),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            };
            return Err(self.map_remote_failure("zfs receive", &failure).await);
        }

        let bytes = copied.map_err(|e| TransportError::Io {
            operation: "streaming snapshot".to_string(),
            reason: e.to_string(),
        })?;
        shutdown.map_err(|e| TransportError::Io {
            operation: "closing ssh stdin".to_string(),
            reason: e.to_string(),
        })?;

        info!("Transferred {} bytes of {}", bytes, stream.snapshot());
        Ok(())
    }

    async fn list_remote_snapshot_names(
        &self,
        dataset: &str,
    ) -> Result<Vec<String>, TransportError> {
        let command = format!("zfs list -t snapshot -H -o name -d 1 {}", shell_quote(dataset));

        match self.run_remote("snapshot listing", command).await {
            Ok(output) => Ok(parse_snapshot_names(&output)),
            Err(TransportError::RemoteCommandFailed { reason, .. })
                if reason.contains("does not exist") =>
            {
                info!("Remote dataset {} does not exist yet", dataset);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn restore_from_remote(
        &self,
        source_dataset: &str,
        snapshot: &str,
        target_dataset: &str,
        force_overwrite: bool,
    ) -> Result<(), TransportError> {
        self.ensure_connected().await?;

        let source = format!("{}@{}", source_dataset, snapshot);
        let send = format!("zfs send -R {}", shell_quote(&source));

        let mut receive_args = vec!["receive".to_string(), "-d".to_string()];
        if force_overwrite {
            receive_args.push("-F".to_string());
        }
        receive_args.push(target_dataset.to_string());

        info!(
            "Restoring {} from {} into {} ({} mode)",
            source,
            self.host,
            target_dataset,
            if force_overwrite { "force" } else { "safe" }
        );

        let mut producer = spawn_producer(SSH, &self.remote_args(send)).map_err(|e| {
            TransportError::Io {
                operation: "spawning remote zfs send".to_string(),
                reason: e.reason(),
            }
        })?;
        let mut consumer = spawn_consumer("zfs", &receive_args).map_err(|e| TransportError::Io {
            operation: "spawning local zfs receive".to_string(),
            reason: e.reason(),
        })?;

        let (Some(mut remote_out), Some(mut local_in)) =
            (producer.stdout.take(), consumer.stdin.take())
        else {
            return Err(TransportError::Io {
                operation: "wiring restore pipes".to_string(),
                reason: "child stdio was not captured".to_string(),
            });
        };

        let copied = tokio::io::copy(&mut remote_out, &mut local_in).await;
        if let Err(e) = local_in.shutdown().await {
            debug!("Closing local zfs receive stdin: {}", e);
        }
        drop(local_in);
        drop(remote_out);

        let sent = producer.wait_with_output().await.map_err(|e| TransportError::Io {
            operation: "waiting for remote zfs send".to_string(),
            reason: e.to_string(),
        })?;
        let received = consumer.wait_with_output().await.map_err(|e| TransportError::Io {
            operation: "waiting for local zfs receive".to_string(),
            reason: e.to_string(),
        })?;

        if !received.status.success() {
            return Err(TransportError::Io {
                operation: format!("zfs receive into {}", target_dataset),
                reason: String::from_utf8_lossy(&received.stderr).trim().to_string(),
            });
        }

        if !sent.status.success() {
            let failure = CommandFailure {
                command: format!("ssh {} zfs send", self.destination()),
                status: sent.status.code(),
                stderr: String::from_utf8_lossy(&sent.stderr).to_string(),
            };
            return Err(self.map_remote_failure("zfs send", &failure).await);
        }

        let bytes = copied.map_err(|e| TransportError::Io {
            operation: "streaming restore".to_string(),
            reason: e.to_string(),
        })?;

        info!("Restore stream of {} complete ({} bytes)", source, bytes);
        Ok(())
    }

    async fn list_remote_datasets(&self) -> Result<Vec<String>, TransportError> {
        let output = self
            .run_remote(
                "dataset listing",
                "zfs list -H -o name -t filesystem,volume".to_string(),
            )
            .await?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut session = self.session.lock().await;
        if session.take().is_none() {
            return Ok(());
        }

        let mut args = self.base_args();
        args.extend(["-O".to_string(), "exit".to_string(), self.destination()]);

        run_command(SSH, &args)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                host: self.host.clone(),
                reason: format!("failed to stop control master: {}", e.reason()),
            })?;

        info!("SSH control master to {} closed", self.host);
        Ok(())
    }
}

/// `host` or `host:port`
fn split_host_port(remote_host: &str) -> (String, Option<u16>) {
    match remote_host.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (remote_host.to_string(), None),
        },
        _ => (remote_host.to_string(), None),
    }
}

fn classify_connect_failure(host: &str, failure: &CommandFailure) -> TransportError {
    let stderr = failure.stderr.as_str();
    if stderr.contains("Permission denied") || stderr.contains("Host key verification failed") {
        TransportError::AuthenticationFailed {
            host: host.to_string(),
        }
    } else if stderr.contains("timed out") {
        TransportError::Timeout {
            host: host.to_string(),
            operation: "connecting".to_string(),
        }
    } else {
        TransportError::ConnectionFailed {
            host: host.to_string(),
            reason: failure.reason(),
        }
    }
}

fn parse_snapshot_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().split_once('@'))
        .map(|(_, name)| name.to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
