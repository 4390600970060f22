//! Production database credentials
//!
//! The pipeline never reads passwords from the configuration file. A
//! [`CredentialsProvider`] supplies them on first use and [`CachedCredentials`]
//! keeps the first successful answer for the rest of the process.

use crate::configuration::VaultSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const PRODUCTION_DB_USER_VAR: &str = "PRODUCTION_DB_USER";
pub const PRODUCTION_DB_PASSWORD_VAR: &str = "PRODUCTION_DB_PASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("production credentials missing: {0} is not set")]
    Missing(String),
    #[error("credentials provider unavailable: {0}")]
    Unavailable(String),
    #[error("credentials provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn database_credentials(&self) -> Result<DatabaseCredentials, CredentialsError>;
}

/// Reads `PRODUCTION_DB_USER` / `PRODUCTION_DB_PASSWORD`.
pub struct EnvCredentials;

#[async_trait]
impl CredentialsProvider for EnvCredentials {
    async fn database_credentials(&self) -> Result<DatabaseCredentials, CredentialsError> {
        let username = std::env::var(PRODUCTION_DB_USER_VAR)
            .map_err(|_| CredentialsError::Missing(PRODUCTION_DB_USER_VAR.to_string()))?;
        let password = std::env::var(PRODUCTION_DB_PASSWORD_VAR)
            .map_err(|_| CredentialsError::Missing(PRODUCTION_DB_PASSWORD_VAR.to_string()))?;
        Ok(DatabaseCredentials { username, password })
    }
}

/// Fixed credentials, handy for local setups and tests.
pub struct StaticCredentials(pub DatabaseCredentials);

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn database_credentials(&self) -> Result<DatabaseCredentials, CredentialsError> {
        Ok(self.0.clone())
    }
}

/// Reads `username`/`password` from a Vault KV secret (v1 or v2 layout).
pub struct VaultCredentials {
    client: Client,
    address: String,
    token: String,
    credentials_path: String,
}

impl fmt::Debug for VaultCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultCredentials")
            .field("address", &self.address)
            .field("token", &"***")
            .field("credentials_path", &self.credentials_path)
            .finish()
    }
}

impl VaultCredentials {
    pub fn new(settings: &VaultSettings) -> Self {
        Self {
            client: Client::new(),
            address: settings.address.clone(),
            token: settings.token.clone(),
            credentials_path: settings.credentials_path.clone(),
        }
    }

    fn secret_url(&self) -> String {
        format!(
            "{}/v1/{}",
            self.address.trim_end_matches('/'),
            self.credentials_path.trim_matches('/')
        )
    }
}

#[async_trait]
impl CredentialsProvider for VaultCredentials {
    #[tracing::instrument(name = "Fetch production credentials from Vault", skip(self))]
    async fn database_credentials(&self) -> Result<DatabaseCredentials, CredentialsError> {
        let body: Value = self
            .client
            .get(self.secret_url())
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach Vault: {:?}", e);
                CredentialsError::Unavailable(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Vault returned error status: {:?}", e);
                CredentialsError::Unavailable(e.to_string())
            })?
            .json()
            .await
            .map_err(|e| CredentialsError::InvalidResponse(e.to_string()))?;

        // KV v2 nests the secret one level deeper
        let data = match body["data"].get("data") {
            Some(inner) if inner.is_object() => inner,
            _ => &body["data"],
        };

        let field = |name: &str| {
            data[name]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| CredentialsError::InvalidResponse(format!("missing field `{}`", name)))
        };

        Ok(DatabaseCredentials {
            username: field("username")?,
            password: field("password")?,
        })
    }
}

/// Resolves credentials lazily and caches the first success. A failed
/// resolution is not cached, so the next caller asks the provider again.
pub struct CachedCredentials {
    provider: Arc<dyn CredentialsProvider>,
    cell: OnceCell<DatabaseCredentials>,
}

impl CachedCredentials {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            provider,
            cell: OnceCell::new(),
        }
    }

    pub async fn resolve(&self) -> Result<&DatabaseCredentials, CredentialsError> {
        self.cell
            .get_or_try_init(|| async {
                let credentials = self.provider.database_credentials().await?;
                tracing::info!(username = %credentials.username, "Resolved production credentials");
                Ok(credentials)
            })
            .await
    }
}
