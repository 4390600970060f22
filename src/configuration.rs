use crate::helpers::credentials::{CachedCredentials, DatabaseCredentials};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_app_host")]
    pub app_host: String,
    #[serde(default = "default_app_port")]
    pub app_port: u16,
    #[serde(default)]
    pub production: ProductionSettings,
    #[serde(default)]
    pub development: DevelopmentSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    pub vault: Option<VaultSettings>,
}

/// The production host and database. Database user and password are not part
/// of the file; they come from a credentials provider at first use.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProductionSettings {
    pub host: String,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub ssh_key_path: Option<PathBuf>,
    pub remote_path: String,
    /// Defaults to `<remote_path>/public/uploads`.
    pub uploads_path: Option<String>,
    pub service_user: String,
    pub remote_tmp_dir: String,
    pub database: RemoteDatabaseSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteDatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DevelopmentSettings {
    pub local_path: PathBuf,
    /// Defaults to `<local_path>/public/uploads`.
    pub uploads_path: Option<PathBuf>,
    pub database: DatabaseSettings,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// rsync exclude patterns for the code mirror
    pub excludes: Vec<String>,
    pub install_command: String,
    pub build_command: String,
    pub connect_timeout_secs: u64,
    /// Per-process limit for the SSH transport. Unset means no limit.
    pub command_timeout_secs: Option<u64>,
    pub history_limit: usize,
}

#[derive(Clone, Deserialize)]
pub struct VaultSettings {
    pub address: String,
    pub token: String,
    /// KV path holding `username` and `password`, e.g. `secret/promoter/production-db`
    pub credentials_path: String,
}

fn default_app_host() -> String {
    "127.0.0.1".to_string()
}

fn default_app_port() -> u16 {
    8000
}

impl Default for ProductionSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            ssh_user: "deploy".to_string(),
            ssh_port: 22,
            ssh_key_path: None,
            remote_path: String::new(),
            uploads_path: None,
            service_user: "www-data".to_string(),
            remote_tmp_dir: "/tmp".to_string(),
            database: RemoteDatabaseSettings::default(),
        }
    }
}

impl ProductionSettings {
    pub fn uploads_path(&self) -> String {
        self.uploads_path.clone().unwrap_or_else(|| {
            format!("{}/public/uploads", self.remote_path.trim_end_matches('/'))
        })
    }

    /// Temp-dir path for a file generated during a run.
    pub fn remote_tmp_file(&self, file_name: &str) -> String {
        format!("{}/{}", self.remote_tmp_dir.trim_end_matches('/'), file_name)
    }

    /// `psql`/`pg_dump` connection flags for the production database.
    pub fn pg_connection_args(&self, credentials: &DatabaseCredentials) -> String {
        format!(
            "-h {} -p {} -U {} -d {}",
            crate::helpers::remote::shell_quote(&self.database.host),
            self.database.port,
            crate::helpers::remote::shell_quote(&credentials.username),
            crate::helpers::remote::shell_quote(&self.database.database_name),
        )
    }
}

impl Default for RemoteDatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database_name: String::new(),
        }
    }
}

impl Default for DevelopmentSettings {
    fn default() -> Self {
        Self {
            local_path: PathBuf::from("."),
            uploads_path: None,
            database: DatabaseSettings::default(),
        }
    }
}

impl DevelopmentSettings {
    pub fn uploads_path(&self) -> PathBuf {
        self.uploads_path
            .clone()
            .unwrap_or_else(|| self.local_path.join("public").join("uploads"))
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            username: "postgres".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            database_name: String::new(),
        }
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .finish()
    }
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("address", &self.address)
            .field("token", &"***")
            .field("credentials_path", &self.credentials_path)
            .finish()
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            excludes: [
                "node_modules",
                ".git",
                ".next",
                "*.log",
                "logs",
                ".env",
                ".env.*",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            install_command: "npm ci --omit=dev".to_string(),
            build_command: "npm run build".to_string(),
            connect_timeout_secs: 10,
            command_timeout_secs: None,
            history_limit: 10,
        }
    }
}

/// Static description of both environments, shared read-only by every
/// pipeline component.
pub struct DeploymentConfig {
    pub production: ProductionSettings,
    pub development: DevelopmentSettings,
    pub sync: SyncSettings,
    credentials: CachedCredentials,
}

impl DeploymentConfig {
    pub fn new(settings: &Settings, credentials: CachedCredentials) -> Self {
        Self {
            production: settings.production.clone(),
            development: settings.development.clone(),
            sync: settings.sync.clone(),
            credentials,
        }
    }

    /// Production database credentials, resolved once and then cached.
    pub async fn production_credentials(&self) -> Result<&DatabaseCredentials, String> {
        self.credentials.resolve().await.map_err(|err| err.to_string())
    }

    pub fn is_production_configured(&self) -> bool {
        !self.production.host.trim().is_empty() && !self.production.remote_path.trim().is_empty()
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Optional `configuration.{yaml,toml,json}` first, then APP__SECTION__KEY
    // environment overrides, e.g. APP__PRODUCTION__HOST
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    settings.try_deserialize()
}
