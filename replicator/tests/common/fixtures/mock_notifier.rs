//! Notifier that records every replication outcome

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use replicator::services::SyncNotifier;

#[derive(Debug, Clone, PartialEq)]
pub enum NotifierEvent {
    Success { snapshot: String, duration: Duration },
    Failure { snapshot: String, error: String },
}

#[derive(Default)]
pub struct MockNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotifierEvent::Success { snapshot, .. } => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotifierEvent::Failure { snapshot, error } => Some((snapshot, error)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SyncNotifier for MockNotifier {
    async fn on_sync_success(
        &self,
        snapshot: &str,
        _dataset: &str,
        duration: Duration,
    ) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(NotifierEvent::Success {
            snapshot: snapshot.to_string(),
            duration,
        });
        Ok(())
    }

    async fn on_sync_failure(
        &self,
        snapshot: &str,
        _dataset: &str,
        error: &str,
    ) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(NotifierEvent::Failure {
            snapshot: snapshot.to_string(),
            error: error.to_string(),
        });
        Ok(())
    }
}
