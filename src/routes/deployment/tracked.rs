use super::options_from_body;
use crate::errors::DeploymentError;
use crate::forms::SyncOptions;
use crate::helpers::JsonResponse;
use crate::models::DeploymentRecord;
use crate::services::DeploymentLifecycleTracker;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder, Result};
use std::sync::Arc;

const TRIGGERED_BY_HEADER: &str = "X-Triggered-By";
const DEFAULT_TRIGGERED_BY: &str = "operator";

fn triggered_by(req: &HttpRequest) -> String {
    req.headers()
        .get(TRIGGERED_BY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_TRIGGERED_BY)
        .to_string()
}

/// Starts a full deployment in the background. The body is optional; an
/// empty request uses the default options.
#[tracing::instrument(name = "Start deployment", skip(req, body, tracker))]
#[post("")]
pub async fn start_handler(
    req: HttpRequest,
    body: web::Bytes,
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<HttpResponse> {
    let options: SyncOptions = options_from_body(&body)?;
    let record = tracker.start_deployment(&triggered_by(&req), options).await?;

    Ok(JsonResponse::build()
        .set_id(record.id.clone())
        .set_item(record)
        .accepted("Deployment started"))
}

#[tracing::instrument(name = "Get deployment", skip(tracker))]
#[get("/status/{id}")]
pub async fn status_handler(
    path: web::Path<String>,
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<impl Responder> {
    let id = path.into_inner();
    match tracker.get_deployment(&id).await {
        Some(record) => Ok(JsonResponse::build()
            .set_id(id)
            .set_item(record)
            .ok("Deployment fetched")),
        None => Err(JsonResponse::<DeploymentRecord>::build()
            .not_found(format!("Deployment {} not found", id))),
    }
}

/// Newest first.
#[tracing::instrument(name = "List deployments", skip(tracker))]
#[get("/history")]
pub async fn history_handler(
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<impl Responder> {
    let mut records = tracker.get_all_deployments().await;
    records.reverse();
    Ok(JsonResponse::build().set_list(records).ok("OK"))
}

#[tracing::instrument(name = "Current deployment", skip(tracker))]
#[get("/current")]
pub async fn current_handler(
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<impl Responder> {
    let response = match tracker.current_deployment().await {
        Some(record) => JsonResponse::build()
            .set_id(record.id.clone())
            .set_item(record)
            .ok("Deployment running"),
        None => JsonResponse::<DeploymentRecord>::build().ok("No deployment running"),
    };
    Ok(response)
}

#[tracing::instrument(name = "Cancel deployment", skip(tracker))]
#[delete("/cancel/{id}")]
pub async fn cancel_handler(
    path: web::Path<String>,
    tracker: web::Data<Arc<DeploymentLifecycleTracker>>,
) -> Result<HttpResponse, DeploymentError> {
    let id = path.into_inner();
    // never succeeds; the error carries the reason
    tracker.cancel_deployment(&id).await?;
    Ok(HttpResponse::Ok().finish())
}
