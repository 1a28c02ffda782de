//! Custom error types for the replicator
//!
//! Provides structured error handling with context (snapshot, dataset, host) for the
//! replication, restore, transport, and configuration paths.

use std::fmt;

/// Local snapshot store errors
#[derive(Debug, Clone)]
pub enum SnapshotError {
    /// Snapshot could not be created (name collision, no space, ...)
    Create { snapshot: String, reason: String },

    /// Snapshot listing failed; callers must not treat this as "no snapshots"
    Enumeration { dataset: String, reason: String },

    /// Snapshot could not be destroyed
    Destroy { snapshot: String, reason: String },

    /// Send stream could not be opened
    StreamOpen { snapshot: String, reason: String },

    /// Send stream producer ended abnormally
    StreamFailed { snapshot: String, reason: String },

    /// Content diff against a snapshot failed
    Diff { snapshot: String, reason: String },

    /// Any other zfs/zpool command failure
    Command { command: String, reason: String },
}

/// Remote transport errors
#[derive(Debug, Clone)]
pub enum TransportError {
    /// Connection to the remote host could not be established
    ConnectionFailed { host: String, reason: String },

    /// Connection establishment exceeded the connect timeout
    Timeout { host: String, operation: String },

    /// Remote host rejected our credentials
    AuthenticationFailed { host: String },

    /// Remote command ran but failed (receive/apply, listing, ...)
    RemoteCommandFailed {
        host: String,
        operation: String,
        reason: String,
    },

    /// Local I/O while moving stream data
    Io { operation: String, reason: String },
}

/// Replication scheduler errors and policy rejections
#[derive(Debug, Clone)]
pub enum ReplicationError {
    /// Another send holds the gate
    AlreadyInProgress,

    /// Shutdown has begun, no new work is accepted
    ShuttingDown,

    /// New snapshot could not be created
    SnapshotCreate { snapshot: String, source: SnapshotError },

    /// Remote snapshot enumeration failed; never degraded to a full send
    RemoteEnumeration {
        dataset: String,
        source: TransportError,
    },

    /// Local snapshot enumeration failed while planning
    LocalEnumeration { source: SnapshotError },

    /// Snapshot to send is not present locally
    SnapshotMissing { snapshot: String },

    /// Remote already holds a snapshot newer than this one
    Superseded { snapshot: String, newer: String },

    /// Send stream could not be opened
    StreamOpen { snapshot: String, source: SnapshotError },

    /// Transport rejected or failed the transfer
    Transfer {
        snapshot: String,
        source: TransportError,
    },

    /// Stream producer ended abnormally after the transport accepted the data
    Producer { snapshot: String, source: SnapshotError },

    /// Retry drain finished with entries still queued
    PendingRemaining { remaining: usize },
}

/// Restore manager errors and policy rejections
#[derive(Debug, Clone)]
pub enum RestoreError {
    /// No job with this id (or it has been evicted)
    JobNotFound { job_id: String },

    /// Confirmation attempted while the job is in another state
    NotAwaitingConfirmation { job_id: String, status: String },

    /// Confirmation attempted on a job that does not need it
    ConfirmationNotRequired { job_id: String },

    /// Request rejected before a job was created
    InvalidRequest { reason: String },

    /// Target existence / uncommitted-data check failed
    SafetyCheck { dataset: String, reason: String },

    /// Source snapshot listing failed
    SourceEnumeration { dataset: String, reason: String },

    /// Requested snapshot does not exist on the source
    SnapshotNotFound { snapshot: String, dataset: String },

    /// Transfer step failed
    Transfer { reason: String },

    /// Transfer reported success but the snapshot is absent locally
    VerificationFailed { snapshot: String, dataset: String },

    /// Worker faulted unexpectedly
    WorkerPanic { reason: String },
}

/// Configuration error variants
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to load configuration file
    LoadFailed { path: String, reason: String },

    /// Invalid configuration value
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    MissingRequired { field: String },

    /// Configuration parsing error
    ParseError { reason: String },
}

impl ReplicationError {
    /// Busy and shutdown outcomes are expected control results, not hard failures
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            ReplicationError::AlreadyInProgress | ReplicationError::ShuttingDown
        )
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ReplicationError::AlreadyInProgress)
    }
}

impl RestoreError {
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            RestoreError::NotAwaitingConfirmation { .. } | RestoreError::ConfirmationNotRequired { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RestoreError::JobNotFound { .. })
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Create { snapshot, reason } => {
                write!(f, "Failed to create snapshot '{}': {}", snapshot, reason)
            }
            SnapshotError::Enumeration { dataset, reason } => {
                write!(f, "Failed to list snapshots of '{}': {}", dataset, reason)
            }
            SnapshotError::Destroy { snapshot, reason } => {
                write!(f, "Failed to destroy snapshot '{}': {}", snapshot, reason)
            }
            SnapshotError::StreamOpen { snapshot, reason } => {
                write!(f, "Failed to open send stream for '{}': {}", snapshot, reason)
            }
            SnapshotError::StreamFailed { snapshot, reason } => {
                write!(f, "Send stream for '{}' ended abnormally: {}", snapshot, reason)
            }
            SnapshotError::Diff { snapshot, reason } => {
                write!(f, "Failed to diff against '{}': {}", snapshot, reason)
            }
            SnapshotError::Command { command, reason } => {
                write!(f, "Command '{}' failed: {}", command, reason)
            }
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed { host, reason } => {
                write!(f, "Connection to {} failed: {}", host, reason)
            }
            TransportError::Timeout { host, operation } => {
                write!(f, "Timeout while {} on {}", operation, host)
            }
            TransportError::AuthenticationFailed { host } => {
                write!(f, "Authentication failed for {}", host)
            }
            TransportError::RemoteCommandFailed {
                host,
                operation,
                reason,
            } => {
                write!(f, "Remote {} on {} failed: {}", operation, host, reason)
            }
            TransportError::Io { operation, reason } => {
                write!(f, "I/O error during {}: {}", operation, reason)
            }
        }
    }
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationError::AlreadyInProgress => {
                write!(f, "snapshot operation already in progress")
            }
            ReplicationError::ShuttingDown => {
                write!(f, "replication is shutting down, no new work accepted")
            }
            ReplicationError::SnapshotCreate { source, .. } => write!(f, "{}", source),
            ReplicationError::RemoteEnumeration { dataset, source } => {
                write!(
                    f,
                    "failed to list remote snapshots of '{}', aborting sync to prevent data loss: {}",
                    dataset, source
                )
            }
            ReplicationError::LocalEnumeration { source } => {
                write!(f, "failed to list local snapshots: {}", source)
            }
            ReplicationError::SnapshotMissing { snapshot } => {
                write!(f, "snapshot '{}' no longer exists locally", snapshot)
            }
            ReplicationError::Superseded { snapshot, newer } => write!(
                f,
                "snapshot '{}' is superseded by '{}' already on the remote",
                snapshot, newer
            ),
            ReplicationError::StreamOpen { source, .. } => write!(f, "{}", source),
            ReplicationError::Transfer { snapshot, source } => {
                write!(f, "transfer of '{}' failed: {}", snapshot, source)
            }
            ReplicationError::Producer { source, .. } => write!(f, "{}", source),
            ReplicationError::PendingRemaining { remaining } => {
                write!(f, "{} snapshots still failed to send", remaining)
            }
        }
    }
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreError::JobNotFound { job_id } => {
                write!(f, "restore job {} not found", job_id)
            }
            RestoreError::NotAwaitingConfirmation { job_id, status } => {
                write!(
                    f,
                    "restore job {} is not awaiting confirmation (status: {})",
                    job_id, status
                )
            }
            RestoreError::ConfirmationNotRequired { job_id } => {
                write!(f, "restore job {} does not require confirmation", job_id)
            }
            RestoreError::InvalidRequest { reason } => {
                write!(f, "invalid restore request: {}", reason)
            }
            RestoreError::SafetyCheck { dataset, reason } => {
                write!(f, "failed to check target dataset '{}': {}", dataset, reason)
            }
            RestoreError::SourceEnumeration { dataset, reason } => {
                write!(f, "failed to list snapshots for dataset {}: {}", dataset, reason)
            }
            RestoreError::SnapshotNotFound { snapshot, dataset } => {
                write!(f, "snapshot {} not found on remote dataset {}", snapshot, dataset)
            }
            RestoreError::Transfer { reason } => write!(f, "restore failed: {}", reason),
            RestoreError::VerificationFailed { snapshot, dataset } => {
                write!(
                    f,
                    "restore verification failed: snapshot {} not found in target dataset {}",
                    snapshot, dataset
                )
            }
            RestoreError::WorkerPanic { reason } => {
                write!(f, "restore worker panicked: {}", reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingRequired { field } => {
                write!(f, "Missing required field: {}", field)
            }
            ConfigError::ParseError { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }
        }
    }
}

impl std::error::Error for SnapshotError {}
impl std::error::Error for TransportError {}
impl std::error::Error for RestoreError {}
impl std::error::Error for ConfigError {}

impl std::error::Error for ReplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplicationError::SnapshotCreate { source, .. }
            | ReplicationError::LocalEnumeration { source }
            | ReplicationError::StreamOpen { source, .. }
            | ReplicationError::Producer { source, .. } => Some(source),
            ReplicationError::RemoteEnumeration { source, .. }
            | ReplicationError::Transfer { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_remote_enumeration_message_names_dataset() {
        let err = ReplicationError::RemoteEnumeration {
            dataset: "backup/tank".to_string(),
            source: TransportError::ConnectionFailed {
                host: "backup.local".to_string(),
                reason: "no route to host".to_string(),
            },
        };

        let message = err.to_string();
        assert!(message.contains("backup/tank"));
        assert!(message.contains("no route to host"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_policy_rejections() {
        assert!(ReplicationError::AlreadyInProgress.is_policy_rejection());
        assert!(ReplicationError::AlreadyInProgress.is_busy());
        assert!(!ReplicationError::PendingRemaining { remaining: 2 }.is_policy_rejection());

        let rejected = RestoreError::NotAwaitingConfirmation {
            job_id: "restore_1".to_string(),
            status: "completed".to_string(),
        };
        assert!(rejected.is_policy_rejection());
        assert!(!rejected.is_not_found());
        assert!(RestoreError::JobNotFound {
            job_id: "restore_1".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn test_superseded_message() {
        let err = ReplicationError::Superseded {
            snapshot: "autosnap_a".to_string(),
            newer: "autosnap_b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "snapshot 'autosnap_a' is superseded by 'autosnap_b' already on the remote"
        );
        assert!(!err.is_policy_rejection());
    }

    #[test]
    fn test_pending_remaining_message() {
        let err = ReplicationError::PendingRemaining { remaining: 3 };
        assert_eq!(err.to_string(), "3 snapshots still failed to send");
    }
}
