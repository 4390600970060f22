use crate::configuration::DeploymentConfig;
use crate::errors::DeploymentError;
use crate::forms::SyncOptions;
use crate::helpers::remote::{shell_quote, RemoteCommand, RemoteExecutor};
use crate::models::{ExportSnapshot, Row, TableSnapshot};
use crate::services::sql::{SqlScript, Statement};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub statements: usize,
    pub records: usize,
    /// Script left on the production host; `None` when nothing was executed.
    pub remote_script: Option<String>,
}

/// Replace-all semantics: every selected table is emptied by a single
/// truncate and then reloaded from the snapshot, in export order.
pub fn build_import_script(snapshot: &ExportSnapshot, options: &SyncOptions) -> (SqlScript, usize) {
    let selected: Vec<(&str, &TableSnapshot)> = snapshot
        .tables()
        .filter(|(_, contents)| options.includes(contents.entity))
        .collect();

    let mut script = SqlScript::new();
    if selected.is_empty() {
        return (script, 0);
    }
    script.push(Statement::DeferConstraints);
    script.push(Statement::truncate(selected.iter().map(|(table, _)| *table)));

    let mut records = 0;
    for (table, contents) in &selected {
        for row in &contents.rows {
            script.push(Statement::insert(table, row));
        }
        if has_integer_ids(&contents.rows) {
            script.push(Statement::reset_sequence(table, "id"));
        }
        records += contents.rows.len();
    }

    (script, records)
}

/// Only integer keys can be backed by a sequence.
fn has_integer_ids(rows: &[Row]) -> bool {
    !rows.is_empty()
        && rows.iter().all(|row| {
            matches!(row.get("id"), Some(Value::Number(id)) if id.is_i64() || id.is_u64())
        })
}

pub struct DataImporter {
    config: Arc<DeploymentConfig>,
    executor: Arc<dyn RemoteExecutor>,
}

impl DataImporter {
    pub fn new(config: Arc<DeploymentConfig>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { config, executor }
    }

    /// Upload the generated script and run it against production in a single
    /// transaction. Does nothing on a dry run.
    #[tracing::instrument(name = "Import into production", skip(self, snapshot, options))]
    pub async fn import_to_production(
        &self,
        snapshot: &ExportSnapshot,
        options: &SyncOptions,
    ) -> Result<ImportSummary, DeploymentError> {
        if options.dry_run {
            tracing::info!("Dry run, import skipped");
            return Ok(ImportSummary::default());
        }

        let (script, records) = build_import_script(snapshot, options);
        if script.is_empty() {
            return Ok(ImportSummary::default());
        }

        let credentials = self
            .config
            .production_credentials()
            .await
            .map_err(DeploymentError::Credentials)?;

        let file_name = format!("deploy_import_{}.sql", Utc::now().format("%Y%m%d_%H%M%S"));
        let local_dir = tempfile::tempdir()
            .map_err(|err| DeploymentError::Import(format!("cannot create temp dir: {}", err)))?;
        let local_path = local_dir.path().join(&file_name);
        tokio::fs::write(&local_path, script.render())
            .await
            .map_err(|err| DeploymentError::Import(format!("cannot write import script: {}", err)))?;

        let production = &self.config.production;
        let remote_script = production.remote_tmp_file(&file_name);

        self.executor
            .upload(&local_path, &remote_script)
            .await
            .map_err(|err| DeploymentError::Import(format!("cannot transfer import script: {}", err)))?;

        let command = RemoteCommand::mutating(format!(
            "psql {} --no-password -v ON_ERROR_STOP=1 --single-transaction -f {}",
            production.pg_connection_args(credentials),
            shell_quote(&remote_script)
        ))
        .with_secret_env("PGPASSWORD", &credentials.password);

        self.executor
            .run(&command)
            .await
            .map_err(|err| DeploymentError::Import(format!("import script failed: {}", err)))?;

        tracing::info!(
            statements = script.len(),
            records,
            remote_script = %remote_script,
            "Import finished"
        );

        Ok(ImportSummary {
            statements: script.len(),
            records,
            remote_script: Some(remote_script),
        })
    }
}
