use promoter::configuration::{DeploymentConfig, Settings};
use promoter::helpers::credentials::{CachedCredentials, DatabaseCredentials, StaticCredentials};
use promoter::helpers::remote::RecordingExecutor;
use promoter::models::Row;
use promoter::services::{
    DeploymentHistory, DeploymentLifecycleTracker, DeploymentOrchestrator, InMemoryDataSource,
    InMemoryDeploymentStore,
};
use serde_json::json;
use std::net::TcpListener;
use std::sync::Arc;

pub struct TestApp {
    pub address: String,
    pub executor: Arc<RecordingExecutor>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
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
        "development": { "local_path": "/srv/site" }
    }))
    .expect("Failed to build test settings")
}

fn property(id: i64, title: &str) -> Row {
    [
        ("id".to_string(), json!(id)),
        ("title".to_string(), json!(title)),
    ]
    .into_iter()
    .collect()
}

/// Starts the server on a random port with a recording transport and a
/// fixed development data set.
pub async fn spawn_app(executor: RecordingExecutor) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let executor = Arc::new(executor);
    let credentials = CachedCredentials::new(Arc::new(StaticCredentials(DatabaseCredentials {
        username: "site".to_string(),
        password: "prod-secret".to_string(),
    })));
    let config = Arc::new(DeploymentConfig::new(&settings(), credentials));
    let source = Arc::new(InMemoryDataSource::new().with_table(
        "properties",
        vec![property(1, "Harbour View"), property(2, "O'Connell Street")],
    ));
    let orchestrator = Arc::new(DeploymentOrchestrator::new(
        config,
        executor.clone(),
        source,
        Arc::new(DeploymentHistory::default()),
    ));
    let tracker = Arc::new(DeploymentLifecycleTracker::new(
        orchestrator,
        Arc::new(InMemoryDeploymentStore::default()),
    ));

    let server = promoter::startup::run(listener, tracker)
        .await
        .expect("Failed to bind address.");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        executor,
        client: reqwest::Client::new(),
    }
}
