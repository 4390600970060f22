//! Shared fixtures for the pipeline unit tests.

use crate::configuration::{DeploymentConfig, Settings};
use crate::helpers::credentials::{
    CachedCredentials, CredentialsError, CredentialsProvider, DatabaseCredentials,
    StaticCredentials, PRODUCTION_DB_PASSWORD_VAR,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

struct MissingCredentials;

#[async_trait]
impl CredentialsProvider for MissingCredentials {
    async fn database_credentials(&self) -> Result<DatabaseCredentials, CredentialsError> {
        Err(CredentialsError::Missing(PRODUCTION_DB_PASSWORD_VAR.to_string()))
    }
}

pub fn settings() -> Settings {
    serde_json::from_value(json!({
        "production": {
            "host": "prod.example.com",
            "ssh_user": "deploy",
            "remote_path": "/var/www/site",
            "database": { "database_name": "site_production" }
        },
        "development": {
            "local_path": "/srv/site",
            "database": { "database_name": "site_development" }
        }
    }))
    .expect("fixture settings are valid")
}

fn static_credentials() -> CachedCredentials {
    CachedCredentials::new(Arc::new(StaticCredentials(DatabaseCredentials {
        username: "site".to_string(),
        password: "prod-secret".to_string(),
    })))
}

pub fn config() -> Arc<DeploymentConfig> {
    Arc::new(DeploymentConfig::new(&settings(), static_credentials()))
}

/// No production host at all.
pub fn unconfigured() -> Arc<DeploymentConfig> {
    let settings: Settings =
        serde_json::from_value(json!({})).expect("empty settings fall back to defaults");
    Arc::new(DeploymentConfig::new(&settings, static_credentials()))
}

pub fn without_credentials() -> Arc<DeploymentConfig> {
    Arc::new(DeploymentConfig::new(
        &settings(),
        CachedCredentials::new(Arc::new(MissingCredentials)),
    ))
}
