pub mod backup;
pub mod export;
pub mod file_sync;
pub mod history;
pub mod import;
pub mod orchestrator;
pub mod probe;
pub mod sql;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use backup::{BackupManager, BackupOutcome};
pub use export::{DataExporter, DataSource, InMemoryDataSource, PgDataSource};
pub use file_sync::FileSyncEngine;
pub use history::{DeploymentHistory, DEFAULT_HISTORY_LIMIT};
pub use import::{DataImporter, ImportSummary};
pub use orchestrator::{DeploymentOrchestrator, SystemStatus};
pub use probe::{ConnectionProbe, ConnectionStatus};
pub use store::{DeploymentStore, InMemoryDeploymentStore};
pub use tracker::DeploymentLifecycleTracker;
