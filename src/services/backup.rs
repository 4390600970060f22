use crate::configuration::DeploymentConfig;
use crate::helpers::remote::{shell_quote, RemoteCommand, RemoteExecutor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const BACKUP_PREFIX: &str = "production_backup_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupOutcome {
    pub success: bool,
    pub backup_file: Option<String>,
    pub message: String,
}

/// Dumps the production database to the remote temp directory before any
/// mutating step. The dump stays on the host for the external retention job.
pub struct BackupManager {
    config: Arc<DeploymentConfig>,
    executor: Arc<dyn RemoteExecutor>,
}

impl BackupManager {
    pub fn new(config: Arc<DeploymentConfig>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { config, executor }
    }

    #[tracing::instrument(name = "Create production backup", skip(self))]
    pub async fn create_production_backup(&self) -> BackupOutcome {
        let credentials = match self.config.production_credentials().await {
            Ok(credentials) => credentials,
            Err(err) => {
                return BackupOutcome {
                    success: false,
                    backup_file: None,
                    message: format!("Backup failed: {}", err),
                }
            }
        };

        let production = &self.config.production;
        let backup_file = production.remote_tmp_file(&backup_file_name(Utc::now()));
        let script = format!(
            "pg_dump {} --no-password -f {}",
            production.pg_connection_args(credentials),
            shell_quote(&backup_file)
        );
        let command = RemoteCommand::mutating(script).with_secret_env("PGPASSWORD", &credentials.password);

        match self.executor.run(&command).await {
            Ok(_) => {
                tracing::info!(backup_file = %backup_file, "Production backup created");
                BackupOutcome {
                    success: true,
                    message: format!("Production backup created: {}", backup_file),
                    backup_file: Some(backup_file),
                }
            }
            Err(err) => BackupOutcome {
                success: false,
                backup_file: None,
                message: format!("Backup failed: {}", err),
            },
        }
    }
}

/// `production_backup_20240131_235959.sql`
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("{}{}.sql", BACKUP_PREFIX, at.format("%Y%m%d_%H%M%S"))
}
