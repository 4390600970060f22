//! Database sync, file sync and full deployment pipelines.
//!
//! Steps run one after another in a fixed order: connectivity, backup,
//! database, files. Failures are collected into the returned
//! [`DeploymentResult`] rather than raised, and nothing is retried; a rerun is
//! the operator's call.

use crate::configuration::DeploymentConfig;
use crate::forms::{FileSyncOptions, SyncOptions};
use crate::helpers::remote::RemoteExecutor;
use crate::models::{DeploymentResult, RunLog};
use crate::services::backup::BackupManager;
use crate::services::export::{DataExporter, DataSource};
use crate::services::file_sync::FileSyncEngine;
use crate::services::history::DeploymentHistory;
use crate::services::import::DataImporter;
use crate::services::probe::{ConnectionProbe, ConnectionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionStatus {
    pub host: String,
    pub remote_path: String,
    pub uploads_path: String,
    pub reachable: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevelopmentStatus {
    pub local_path: PathBuf,
    pub uploads_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub production: ProductionStatus,
    pub development: DevelopmentStatus,
    pub last_deployment: Option<DateTime<Utc>>,
    pub last_deployment_success: Option<bool>,
    pub deployment_running: bool,
}

pub struct DeploymentOrchestrator {
    config: Arc<DeploymentConfig>,
    probe: ConnectionProbe,
    backup: BackupManager,
    exporter: DataExporter,
    importer: DataImporter,
    files: FileSyncEngine,
    history: Arc<DeploymentHistory>,
}

impl DeploymentOrchestrator {
    pub fn new(
        config: Arc<DeploymentConfig>,
        executor: Arc<dyn RemoteExecutor>,
        source: Arc<dyn DataSource>,
        history: Arc<DeploymentHistory>,
    ) -> Self {
        Self {
            probe: ConnectionProbe::new(config.clone(), executor.clone()),
            backup: BackupManager::new(config.clone(), executor.clone()),
            exporter: DataExporter::new(source),
            importer: DataImporter::new(config.clone(), executor.clone()),
            files: FileSyncEngine::new(config.clone(), executor),
            config,
            history,
        }
    }

    pub fn history(&self) -> &Arc<DeploymentHistory> {
        &self.history
    }

    pub async fn test_connection(&self) -> ConnectionStatus {
        self.probe.test_connection().await
    }

    /// Backup (optional), export, then import unless this is a dry run.
    #[tracing::instrument(name = "Sync database", skip(self))]
    pub async fn sync_database(&self, options: &SyncOptions) -> DeploymentResult {
        let result = self.run_database_sync(options).await;
        self.history.record(result.clone()).await;
        result
    }

    #[tracing::instrument(name = "Sync files", skip(self))]
    pub async fn sync_files(&self, options: &FileSyncOptions) -> DeploymentResult {
        let result = self.files.sync_files(options).await;
        self.history.record(result.clone()).await;
        result
    }

    /// Connectivity check, then database sync and file sync. Both sync steps
    /// run even if the first one fails, since they cannot be rolled back
    /// together anyway.
    #[tracing::instrument(name = "Full deployment", skip(self))]
    pub async fn full_deployment(&self, options: &SyncOptions) -> DeploymentResult {
        let result = self.run_full_deployment(options).await;
        self.history.record(result.clone()).await;
        result
    }

    pub async fn get_system_status(&self) -> SystemStatus {
        let connection = self.probe.test_connection().await;
        let latest = self.history.latest().await;
        let production = &self.config.production;
        let development = &self.config.development;

        SystemStatus {
            production: ProductionStatus {
                host: production.host.clone(),
                remote_path: production.remote_path.clone(),
                uploads_path: production.uploads_path(),
                reachable: connection.success,
                message: connection.message,
            },
            development: DevelopmentStatus {
                local_path: development.local_path.clone(),
                uploads_path: development.uploads_path(),
            },
            last_deployment: latest.as_ref().map(|r| r.timestamp()),
            last_deployment_success: latest.as_ref().map(|r| r.success()),
            deployment_running: false,
        }
    }

    async fn run_database_sync(&self, options: &SyncOptions) -> DeploymentResult {
        let mut log = RunLog::new();

        if options.dry_run {
            log.detail("Dry run: simulating database sync, production database will not be modified");
        }

        if !options.backup_first {
            log.detail("Backup skipped: disabled for this run");
        } else if options.dry_run {
            log.detail("Dry run: skipped production backup");
        } else {
            let backup = self.backup.create_production_backup().await;
            if !backup.success {
                log.error(backup.message);
                return log.finish(false, "Database sync aborted: production backup failed");
            }
            log.detail(backup.message);
        }

        let snapshot = match self.exporter.export_development_data(options).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log.error(err.to_string());
                return log.finish(false, "Database sync failed: could not export development data");
            }
        };
        // reported on dry runs too, so the scope can be checked before a real run
        log.detail(format!(
            "Exported {} records from development ({})",
            snapshot.total_records(),
            snapshot.summary()
        ));

        if options.dry_run {
            log.detail(format!(
                "Dry run: would import {} records into production",
                snapshot.total_records()
            ));
            return log.finish(true, "Database sync simulation completed");
        }

        match self.importer.import_to_production(&snapshot, options).await {
            Ok(summary) => log.detail(format!(
                "Imported {} records into production database ({} statements)",
                summary.records, summary.statements
            )),
            Err(err) => log.error(err.to_string()),
        }

        let success = !log.has_errors();
        let message = if success {
            "Database sync completed successfully"
        } else {
            "Database sync failed"
        };
        log.finish(success, message)
    }

    async fn run_full_deployment(&self, options: &SyncOptions) -> DeploymentResult {
        let mut log = RunLog::new();

        let connection = self.probe.test_connection().await;
        if !connection.success {
            log.error(connection.message);
            return log.finish(false, "Deployment aborted: production is not reachable");
        }
        log.detail(connection.message);

        let database = self.run_database_sync(options).await;
        log.absorb(&database);

        let files = self
            .files
            .sync_files(&FileSyncOptions {
                include_uploads: options.include_files,
                dry_run: options.dry_run,
            })
            .await;
        log.absorb(&files);

        let success = options.dry_run || (database.success() && files.success());
        let message = if options.dry_run {
            "Dry run completed: no changes were made to production"
        } else if success {
            "Deployment completed successfully"
        } else {
            "Deployment completed with errors"
        };
        log.finish(success, message)
    }
}
