//! HTTP request handlers for the replicator API.
//!
//! - `common` - Response envelope and error helpers
//! - `replication` - Status, snapshot listing and manual triggers
//! - `restore` - Restore job creation, polling and confirmation

pub mod common;
pub mod replication;
pub mod restore;

pub use replication::*;
pub use restore::*;
