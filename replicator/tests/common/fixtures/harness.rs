//! Scheduler and restore manager wired to the in-memory fixtures

use std::sync::Arc;

use super::mock_notifier::MockNotifier;
use super::mock_scrubber::MockScrubber;
use super::mock_store::MockSnapshotStore;
use super::mock_transport::MockTransport;
use super::test_data::{datasets, sequential_namer, test_config};
use replicator::restore::RestoreManager;
use replicator::scheduler::ReplicationScheduler;
use replicator::web::AppState;

pub struct TestHarness {
    pub store: Arc<MockSnapshotStore>,
    pub transport: Arc<MockTransport>,
    pub notifier: Arc<MockNotifier>,
    pub scrubber: Arc<MockScrubber>,
    pub scheduler: Arc<ReplicationScheduler>,
    pub restore_manager: Arc<RestoreManager>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(
            MockSnapshotStore::new(datasets::LOCAL),
            MockTransport::new(datasets::REMOTE),
            30,
            sequential_namer(),
        )
    }

    pub fn build<F>(
        store: MockSnapshotStore,
        transport: MockTransport,
        retention_count: usize,
        namer: F,
    ) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        let store = Arc::new(store);
        let transport = Arc::new(transport);
        let notifier = Arc::new(MockNotifier::new());
        let scrubber = Arc::new(MockScrubber::new(&["tank"]));

        transport.attach_local_store(store.clone());

        let scheduler = Arc::new(
            ReplicationScheduler::new(
                store.clone(),
                transport.clone(),
                scrubber.clone(),
                notifier.clone(),
                datasets::REMOTE,
                retention_count,
            )
            .with_snapshot_namer(namer),
        );

        let restore_manager = Arc::new(RestoreManager::new(
            store.clone(),
            transport.clone(),
            datasets::REMOTE,
        ));

        Self {
            store,
            transport,
            notifier,
            scrubber,
            scheduler,
            restore_manager,
        }
    }

    /// Router state backed by the same fixtures
    pub fn app_state(&self) -> AppState {
        AppState::new(
            test_config(),
            self.scheduler.clone(),
            self.restore_manager.clone(),
            self.transport.clone(),
        )
    }
}
