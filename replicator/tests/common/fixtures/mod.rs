//! This module provides reusable test utilities:
//! - In-memory snapshot store and scriptable transport
//! - Recording notifier and scrubber
//! - Mock webhook server
//! - Common test data and a scheduler harness

// Allow unused code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod harness;
pub mod mock_notifier;
pub mod mock_scrubber;
pub mod mock_store;
pub mod mock_transport;
pub mod mock_webhook;
pub mod test_data;

// Re-export commonly used items
pub use harness::TestHarness;
pub use mock_notifier::{MockNotifier, NotifierEvent};
pub use mock_scrubber::MockScrubber;
pub use mock_store::MockSnapshotStore;
pub use mock_transport::{MockTransport, RecordedRestore, RecordedSend};
pub use mock_webhook::MockWebhookServer;
pub use test_data::*;
