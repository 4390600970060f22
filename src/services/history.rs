use crate::models::DeploymentResult;
use std::collections::VecDeque;
use tokio::sync::RwLock;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Bounded ledger of finished runs, oldest first. Appending past the limit
/// discards the oldest entry.
pub struct DeploymentHistory {
    entries: RwLock<VecDeque<DeploymentResult>>,
    capacity: usize,
}

impl DeploymentHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub async fn record(&self, result: DeploymentResult) {
        let mut entries = self.entries.write().await;
        entries.push_back(result);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub async fn latest(&self) -> Option<DeploymentResult> {
        self.entries.read().await.back().cloned()
    }

    pub async fn recent(&self) -> Vec<DeploymentResult> {
        self.entries.read().await.iter().cloned().collect()
    }
}

impl Default for DeploymentHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
