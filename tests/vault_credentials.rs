/// Vault-backed production credentials against a mock Vault server.
/// Run: cargo t vault_credentials -- --nocapture
use promoter::configuration::VaultSettings;
use promoter::helpers::credentials::{
    CachedCredentials, CredentialsError, CredentialsProvider, VaultCredentials,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> VaultSettings {
    VaultSettings {
        address: server.uri(),
        token: "s.test-token".to_string(),
        credentials_path: "secret/data/promoter/production-db".to_string(),
    }
}

#[tokio::test]
async fn reads_kv2_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/promoter/production-db"))
        .and(header("X-Vault-Token", "s.test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "data": { "username": "site", "password": "prod-secret" },
                "metadata": { "version": 3 }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cached = CachedCredentials::new(Arc::new(VaultCredentials::new(&settings(&server))));
    let credentials = cached.resolve().await.unwrap();
    assert_eq!(credentials.username, "site");
    assert_eq!(credentials.password, "prod-secret");

    // served from the cache, the mock expects exactly one request
    cached.resolve().await.unwrap();
}

#[tokio::test]
async fn reads_kv1_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/promoter/production-db"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "username": "site", "password": "kv1-secret" }
        })))
        .mount(&server)
        .await;

    let credentials = VaultCredentials::new(&settings(&server))
        .database_credentials()
        .await
        .unwrap();
    assert_eq!(credentials.password, "kv1-secret");
}

#[tokio::test]
async fn forbidden_token_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = VaultCredentials::new(&settings(&server))
        .database_credentials()
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialsError::Unavailable(_)));
}

#[tokio::test]
async fn secret_without_password_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "username": "site" }
        })))
        .mount(&server)
        .await;

    let err = VaultCredentials::new(&settings(&server))
        .database_credentials()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("password"));
}
