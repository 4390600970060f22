use crate::configuration::DatabaseSettings;
use crate::errors::DeploymentError;
use crate::forms::SyncOptions;
use crate::models::{ExportSnapshot, Row, TableSpec};
use crate::services::sql::quote_identifier;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Read access to the development database.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Every row of `table`, unfiltered.
    async fn fetch_rows(&self, table: &TableSpec) -> Result<Vec<Row>, DeploymentError>;
}

/// Development Postgres. The pool connects on first use, so a database that
/// is down only fails the export, not the process start.
pub struct PgDataSource {
    pool: PgPool,
}

impl PgDataSource {
    pub fn connect_lazy(settings: &DatabaseSettings) -> Self {
        let connect_options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.username)
            .password(&settings.password)
            .database(&settings.database_name)
            .ssl_mode(PgSslMode::Prefer);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy_with(connect_options);

        Self { pool }
    }
}

/// A development column as listed by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    /// Arrays and `numeric` are read as their Postgres text form: JSON has no
    /// array literal Postgres accepts back, and f64 would round `numeric`.
    fn select_expression(&self) -> String {
        let column = quote_identifier(&self.name);
        match self.data_type.as_str() {
            "ARRAY" | "numeric" => format!("{}::text AS {}", column, column),
            _ => column,
        }
    }
}

const COLUMNS_QUERY: &str = "SELECT column_name::text AS name, data_type::text AS data_type \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

/// `row_to_json` keeps the table's column order in the text output.
fn select_rows_query(table: &TableSpec, columns: &[ColumnInfo]) -> String {
    let selected = columns
        .iter()
        .filter(|column| match table.columns {
            Some(allowed) => allowed.contains(&column.name.as_str()),
            None => true,
        })
        .map(ColumnInfo::select_expression)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT row_to_json(t)::text FROM (SELECT {} FROM {}) t",
        selected,
        quote_identifier(table.name)
    )
}

#[async_trait]
impl DataSource for PgDataSource {
    #[tracing::instrument(name = "Read development table", skip(self, table), fields(table = table.name))]
    async fn fetch_rows(&self, table: &TableSpec) -> Result<Vec<Row>, DeploymentError> {
        let columns: Vec<ColumnInfo> = sqlx::query_as(COLUMNS_QUERY)
            .bind(table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!("Failed to list columns of {}: {:?}", table.name, err);
                DeploymentError::Export(format!("failed to read {}: {}", table.name, err))
            })?;
        if columns.is_empty() {
            return Err(DeploymentError::Export(format!(
                "failed to read {}: table does not exist",
                table.name
            )));
        }

        let query = select_rows_query(table, &columns);
        let rows: Vec<String> = sqlx::query_scalar(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!("Failed to read {}: {:?}", table.name, err);
                DeploymentError::Export(format!("failed to read {}: {}", table.name, err))
            })?;

        rows.iter()
            .map(|raw| {
                serde_json::from_str::<Row>(raw).map_err(|err| {
                    DeploymentError::Export(format!("invalid row in {}: {}", table.name, err))
                })
            })
            .collect()
    }
}

/// Fixed table contents, for tests and local wiring.
#[derive(Default)]
pub struct InMemoryDataSource {
    tables: HashMap<String, Vec<Row>>,
    failing: Vec<String>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(table.to_string(), rows);
        self
    }

    /// Make reads of `table` fail.
    pub fn failing_on(mut self, table: &str) -> Self {
        self.failing.push(table.to_string());
        self
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn fetch_rows(&self, table: &TableSpec) -> Result<Vec<Row>, DeploymentError> {
        if self.failing.iter().any(|t| t == table.name) {
            return Err(DeploymentError::Export(format!(
                "failed to read {}: relation unavailable",
                table.name
            )));
        }
        let rows = self.tables.get(table.name).cloned().unwrap_or_default();
        Ok(match table.columns {
            Some(columns) => rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter(|(name, _)| columns.contains(&name.as_str()))
                        .collect::<Row>()
                })
                .collect(),
            None => rows,
        })
    }
}

pub struct DataExporter {
    source: Arc<dyn DataSource>,
}

impl DataExporter {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// Full snapshot of every entity enabled in `options`.
    #[tracing::instrument(name = "Export development data", skip(self, options))]
    pub async fn export_development_data(
        &self,
        options: &SyncOptions,
    ) -> Result<ExportSnapshot, DeploymentError> {
        let mut snapshot = ExportSnapshot::default();

        for entity in options.selected_entities() {
            for table in entity.tables() {
                let rows = self.source.fetch_rows(table).await?;
                tracing::info!(table = table.name, rows = rows.len(), "Exported {}", entity.label());
                snapshot.push(table.name, entity, rows);
            }
        }

        Ok(snapshot)
    }
}
