use crate::errors::DeploymentError;
use crate::models::{DeploymentRecord, DeploymentResult};
use crate::services::history::DEFAULT_HISTORY_LIMIT;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Storage for tracked deployment records.
///
/// `begin` is the single-flight gate: checking for a running record and
/// inserting the new one happen as one step. A store shared between replicas
/// must provide the same guarantee.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Insert a running record, or fail with [`DeploymentError::Conflict`]
    /// if another record is still running.
    async fn begin(&self, record: DeploymentRecord) -> Result<(), DeploymentError>;

    /// Attach the result to a running record. Returns the updated record, or
    /// `None` if the id is unknown or already finished.
    async fn complete(&self, id: &str, result: DeploymentResult) -> Option<DeploymentRecord>;

    async fn get(&self, id: &str) -> Option<DeploymentRecord>;

    /// Retained records, oldest first.
    async fn list(&self) -> Vec<DeploymentRecord>;

    async fn running(&self) -> Option<DeploymentRecord>;
}

/// Process-local store. Single-flight only holds within this process.
pub struct InMemoryDeploymentStore {
    records: RwLock<VecDeque<DeploymentRecord>>,
    capacity: usize,
}

impl InMemoryDeploymentStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryDeploymentStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[async_trait]
impl DeploymentStore for InMemoryDeploymentStore {
    async fn begin(&self, record: DeploymentRecord) -> Result<(), DeploymentError> {
        let mut records = self.records.write().await;
        if let Some(running) = records.iter().find(|r| r.is_running()) {
            return Err(DeploymentError::Conflict {
                running_id: running.id.clone(),
            });
        }
        records.push_back(record);

        // evict the oldest finished records; a running one is never dropped
        while records.len() > self.capacity {
            match records.iter().position(|r| !r.is_running()) {
                Some(index) => {
                    records.remove(index);
                }
                None => break,
            }
        }
        Ok(())
    }

    async fn complete(&self, id: &str, result: DeploymentResult) -> Option<DeploymentRecord> {
        let mut records = self.records.write().await;
        let record = records.iter_mut().find(|r| r.id == id)?;
        if record.finish(result) {
            Some(record.clone())
        } else {
            None
        }
    }

    async fn get(&self, id: &str) -> Option<DeploymentRecord> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    async fn list(&self) -> Vec<DeploymentRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    async fn running(&self) -> Option<DeploymentRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.is_running())
            .cloned()
    }
}
