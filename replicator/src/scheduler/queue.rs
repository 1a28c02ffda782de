use std::collections::VecDeque;

/// Snapshot names whose transfer failed, oldest failure first.
///
/// Only ever touched while the scheduler's send gate is held.
#[derive(Debug, Default, Clone)]
pub struct PendingSendQueue {
    entries: VecDeque<String>,
}

impl PendingSendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot; returns false if it was already queued
    pub fn push(&mut self, snapshot: &str) -> bool {
        if self.contains(snapshot) {
            return false;
        }
        self.entries.push_back(snapshot.to_string());
        true
    }

    pub fn remove(&mut self, snapshot: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s != snapshot);
        self.entries.len() != before
    }

    pub fn contains(&self, snapshot: &str) -> bool {
        self.entries.iter().any(|s| s == snapshot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}
