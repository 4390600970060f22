use crate::errors::DeploymentError;
use crate::forms::SyncOptions;
use crate::models::{DeploymentRecord, DeploymentResult, RunLog};
use crate::services::orchestrator::{DeploymentOrchestrator, SystemStatus};
use crate::services::store::DeploymentStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::Instrument;

/// Runs deployments and tracks their lifecycle.
///
/// At most one deployment touches production at a time, whether it was
/// started in the background or runs for the duration of a request. A started
/// deployment always reaches `success` or `failed`; there is no way to stop it
/// part way.
pub struct DeploymentLifecycleTracker {
    orchestrator: Arc<DeploymentOrchestrator>,
    store: Arc<dyn DeploymentStore>,
    /// Id of the synchronous run holding production, if any. The lock is also
    /// taken while a background run registers, so both paths see each other.
    exclusive: Arc<Mutex<Option<String>>>,
}

fn aborted(err: JoinError) -> DeploymentResult {
    tracing::error!("Deployment task aborted: {}", err);
    let mut log = RunLog::new();
    log.error(format!("Deployment task aborted: {}", err));
    log.finish(false, "Deployment failed unexpectedly")
}

impl DeploymentLifecycleTracker {
    pub fn new(orchestrator: Arc<DeploymentOrchestrator>, store: Arc<dyn DeploymentStore>) -> Self {
        Self {
            orchestrator,
            store,
            exclusive: Arc::new(Mutex::new(None)),
        }
    }

    pub fn orchestrator(&self) -> &Arc<DeploymentOrchestrator> {
        &self.orchestrator
    }

    /// Register a running record and start the full deployment in the
    /// background. Returns the record as registered, before any step ran.
    #[tracing::instrument(name = "Start tracked deployment", skip(self, options))]
    pub async fn start_deployment(
        &self,
        triggered_by: &str,
        options: SyncOptions,
    ) -> Result<DeploymentRecord, DeploymentError> {
        let record = DeploymentRecord::start(triggered_by);
        {
            let slot = self.exclusive.lock().await;
            if let Some(running_id) = slot.as_ref() {
                return Err(DeploymentError::Conflict {
                    running_id: running_id.clone(),
                });
            }
            self.store.begin(record.clone()).await?;
        }
        tracing::info!(deployment_id = %record.id, "Deployment started");

        let orchestrator = self.orchestrator.clone();
        let store = self.store.clone();
        let id = record.id.clone();
        let span = tracing::info_span!("Tracked deployment", deployment_id = %id);

        tokio::spawn(
            async move {
                let run = tokio::spawn(async move { orchestrator.full_deployment(&options).await });
                // a panicking run must not leave the record running forever
                let result = run.await.unwrap_or_else(aborted);

                let success = result.success();
                match store.complete(&id, result).await {
                    Some(_) => tracing::info!(success, "Deployment finished"),
                    None => tracing::warn!("Deployment record missing or already finished"),
                }
            }
            .instrument(span),
        );

        Ok(record)
    }

    /// Run `operation` against production while holding the same gate as
    /// [`start_deployment`](Self::start_deployment), and wait for its result.
    ///
    /// The run is detached from the caller: dropping the returned future does
    /// not stop it, and the gate is released only once it finished.
    #[tracing::instrument(name = "Run exclusive deployment", skip(self, operation))]
    pub async fn run_exclusive<F, Fut>(
        &self,
        kind: &'static str,
        operation: F,
    ) -> Result<DeploymentResult, DeploymentError>
    where
        F: FnOnce(Arc<DeploymentOrchestrator>) -> Fut,
        Fut: Future<Output = DeploymentResult> + Send + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut slot = self.exclusive.lock().await;
            if let Some(running_id) = slot.as_ref() {
                return Err(DeploymentError::Conflict {
                    running_id: running_id.clone(),
                });
            }
            if let Some(record) = self.store.running().await {
                return Err(DeploymentError::Conflict {
                    running_id: record.id,
                });
            }
            *slot = Some(id.clone());
        }
        tracing::info!(run_id = %id, "Exclusive run started");

        let run = tokio::spawn(operation(self.orchestrator.clone()));
        let exclusive = self.exclusive.clone();
        let span = tracing::info_span!("Exclusive run", run_id = %id, kind);
        let guarded = tokio::spawn(
            async move {
                let result = run.await.unwrap_or_else(aborted);
                *exclusive.lock().await = None;
                tracing::info!(success = result.success(), "Exclusive run finished");
                result
            }
            .instrument(span),
        );

        Ok(guarded.await.unwrap_or_else(aborted))
    }

    pub async fn get_deployment(&self, id: &str) -> Option<DeploymentRecord> {
        self.store.get(id).await
    }

    /// Retained records, newest last.
    pub async fn get_all_deployments(&self) -> Vec<DeploymentRecord> {
        self.store.list().await
    }

    pub async fn current_deployment(&self) -> Option<DeploymentRecord> {
        self.store.running().await
    }

    /// True while a background or synchronous run holds production.
    pub async fn is_deployment_running(&self) -> bool {
        self.exclusive.lock().await.is_some() || self.store.running().await.is_some()
    }

    /// Always refuses. Steps already applied to production cannot be undone,
    /// so a running deployment is left to finish.
    pub async fn cancel_deployment(&self, id: &str) -> Result<DeploymentRecord, DeploymentError> {
        match self.store.get(id).await {
            None => Err(DeploymentError::NotFound(id.to_string())),
            Some(record) if record.is_running() => {
                tracing::warn!(deployment_id = %id, "Cancellation requested but not supported");
                Err(DeploymentError::CancellationUnsupported(id.to_string()))
            }
            Some(_) => Err(DeploymentError::NotRunning(id.to_string())),
        }
    }

    pub async fn get_system_status(&self) -> SystemStatus {
        let mut status = self.orchestrator.get_system_status().await;
        status.deployment_running = self.is_deployment_running().await;
        status
    }
}
