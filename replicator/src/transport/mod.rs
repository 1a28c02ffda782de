//! Byte-stream transport to and from the backup host
//!
//! Implementations perform no retries of their own: a failed send means the snapshot
//! was not delivered and the caller does the bookkeeping. Enumeration failures are
//! always errors and never an empty list, except for a remote dataset that does not
//! exist yet (first sync).
//!
//! A single transport instance is not assumed to be safe for concurrent sends; the
//! replication scheduler funnels every send through its single-flight gate.

pub mod ssh;

pub use ssh::SshTransport;

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::zfs::SendStream;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Consume the whole stream and return once the remote side has applied it
    async fn send_stream(
        &self,
        stream: &mut SendStream,
        incremental: bool,
    ) -> Result<(), TransportError>;

    async fn list_remote_snapshot_names(&self, dataset: &str)
        -> Result<Vec<String>, TransportError>;

    /// Stream `source_dataset@snapshot` from the remote host into a local dataset.
    /// Without `force_overwrite` the receive fails rather than rolling back a diverged target.
    async fn restore_from_remote(
        &self,
        source_dataset: &str,
        snapshot: &str,
        target_dataset: &str,
        force_overwrite: bool,
    ) -> Result<(), TransportError>;

    async fn list_remote_datasets(&self) -> Result<Vec<String>, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}
