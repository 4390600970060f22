use promoter::configuration::get_configuration;
use promoter::startup::{build_tracker, run};
use promoter::telemetry::{get_subscriber, init_subscriber};
use std::net::TcpListener;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber("promoter".into(), "info".into());
    init_subscriber(subscriber);

    let settings = get_configuration().expect("Failed to read configuration.");

    tracing::info!(
        production_host = %settings.production.host,
        remote_path = %settings.production.remote_path,
        local_path = %settings.development.local_path.display(),
        "Deployment targets loaded"
    );
    if settings.production.host.trim().is_empty() {
        tracing::warn!("Production host is not configured; deployments will fail until it is set");
    }

    let tracker = build_tracker(&settings);

    let address = format!("{}:{}", settings.app_host, settings.app_port);
    tracing::info!("Start server at {:?}", &address);
    let listener =
        TcpListener::bind(&address).expect(&format!("failed to bind to {}", settings.app_port));

    run(listener, tracker).await?.await
}
