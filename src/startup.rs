use crate::configuration::{DeploymentConfig, Settings};
use crate::helpers::credentials::{
    CachedCredentials, CredentialsProvider, EnvCredentials, VaultCredentials,
};
use crate::helpers::remote::OpenSshExecutor;
use crate::routes;
use crate::services::{
    DeploymentHistory, DeploymentLifecycleTracker, DeploymentOrchestrator, InMemoryDeploymentStore,
    PgDataSource,
};
use actix_cors::Cors;
use actix_web::{dev::Server, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

/// Wire the production pipeline from settings: OpenSSH transport, development
/// Postgres, credentials from Vault when configured and from the environment
/// otherwise.
pub fn build_tracker(settings: &Settings) -> Arc<DeploymentLifecycleTracker> {
    let provider: Arc<dyn CredentialsProvider> = match &settings.vault {
        Some(vault) => {
            tracing::info!(address = %vault.address, "Production credentials from Vault");
            Arc::new(VaultCredentials::new(vault))
        }
        None => Arc::new(EnvCredentials),
    };
    let config = Arc::new(DeploymentConfig::new(settings, CachedCredentials::new(provider)));

    let executor = Arc::new(OpenSshExecutor::from_settings(
        &settings.production,
        &settings.sync,
    ));
    let source = Arc::new(PgDataSource::connect_lazy(&settings.development.database));
    let history = Arc::new(DeploymentHistory::new(settings.sync.history_limit));
    let orchestrator = Arc::new(DeploymentOrchestrator::new(config, executor, source, history));
    let store = Arc::new(InMemoryDeploymentStore::new(settings.sync.history_limit));

    Arc::new(DeploymentLifecycleTracker::new(orchestrator, store))
}

pub async fn run(
    listener: TcpListener,
    tracker: Arc<DeploymentLifecycleTracker>,
) -> Result<Server, std::io::Error> {
    let tracker = web::Data::new(tracker);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .service(web::scope("/health_check").service(routes::health_check))
            .service(
                web::scope("/api/deploy")
                    .service(routes::deployment::tracked::start_handler)
                    .service(routes::deployment::tracked::status_handler)
                    .service(routes::deployment::tracked::history_handler)
                    .service(routes::deployment::tracked::current_handler)
                    .service(routes::deployment::tracked::cancel_handler),
            )
            .service(
                web::scope("/api/deployment")
                    .service(routes::deployment::direct::sync_database_handler)
                    .service(routes::deployment::direct::sync_files_handler)
                    .service(routes::deployment::direct::deploy_handler)
                    .service(routes::deployment::direct::status_handler)
                    .service(routes::deployment::direct::test_connection_handler),
            )
            .app_data(tracker.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
