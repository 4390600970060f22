//! Synchronous endpoints: the request waits for the run to finish and gets
//! the full result back. Mutating runs share the tracker's single-flight gate.

use super::options_from_body;
use crate::forms::{FileSyncOptions, SyncOptions};
use crate::helpers::JsonResponse;
use crate::models::DeploymentResult;
use crate::services::DeploymentLifecycleTracker;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpResponse, Responder, Result};
use std::sync::Arc;

fn result_response(result: DeploymentResult) -> HttpResponse {
    let status = if result.success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = result.message().to_string();
    JsonResponse::build().set_item(result).respond(status, message)
}

#[tracing::instrument(name = "Sync database", skip(body, tracker))]
#[post("/sync-database")]
pub async fn sync_database_handler(
    body: web::Bytes,
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<HttpResponse> {
    let options: SyncOptions = options_from_body(&body)?;
    let result = tracker
        .run_exclusive("sync database", move |orchestrator| async move {
            orchestrator.sync_database(&options).await
        })
        .await?;
    Ok(result_response(result))
}

#[tracing::instrument(name = "Sync files", skip(body, tracker))]
#[post("/sync-files")]
pub async fn sync_files_handler(
    body: web::Bytes,
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<HttpResponse> {
    let options: FileSyncOptions = options_from_body(&body)?;
    let result = tracker
        .run_exclusive("sync files", move |orchestrator| async move {
            orchestrator.sync_files(&options).await
        })
        .await?;
    Ok(result_response(result))
}

#[tracing::instrument(name = "Deploy synchronously", skip(body, tracker))]
#[post("/deploy")]
pub async fn deploy_handler(
    body: web::Bytes,
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<HttpResponse> {
    let options: SyncOptions = options_from_body(&body)?;
    let result = tracker
        .run_exclusive("full deployment", move |orchestrator| async move {
            orchestrator.full_deployment(&options).await
        })
        .await?;
    Ok(result_response(result))
}

#[tracing::instrument(name = "System status", skip(tracker))]
#[get("/status")]
pub async fn status_handler(
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<impl Responder> {
    let status = tracker.get_system_status().await;
    Ok(JsonResponse::build().set_item(status).ok("OK"))
}

#[tracing::instrument(name = "Test connection", skip(tracker))]
#[get("/test-connection")]
pub async fn test_connection_handler(
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<impl Responder> {
    let connection = tracker.orchestrator().test_connection().await;
    let message = connection.message.clone();
    Ok(JsonResponse::build().set_item(connection).ok(message))
}
