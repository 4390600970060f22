use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;

/// Failure modes of the promotion pipeline.
///
/// Inside a run these are rendered into `DeploymentResult::errors`; only the
/// lifecycle tracker and the HTTP layer hand them to callers directly.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    /// Production host unreachable, authentication refused or host key rejected
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    /// Production credentials could not be resolved
    #[error("Credentials error: {0}")]
    Credentials(String),
    /// The remote dump command failed
    #[error("Backup error: {0}")]
    Backup(String),
    /// Reading from the development database failed
    #[error("Export error: {0}")]
    Export(String),
    /// Building, transferring or executing the import script failed
    #[error("Import error: {0}")]
    Import(String),
    /// Mirroring or the remote install/build/permission steps failed
    #[error("File sync error: {0}")]
    FileSync(String),
    /// Another deployment is already running
    #[error("Deployment {running_id} is already running")]
    Conflict { running_id: String },
    #[error("Deployment {0} not found")]
    NotFound(String),
    #[error("Deployment {0} is not running")]
    NotRunning(String),
    #[error("Cancellation is not supported: deployment {0} will run to completion")]
    CancellationUnsupported(String),
}

impl ResponseError for DeploymentError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Connectivity(_) => StatusCode::BAD_GATEWAY,
            Self::Credentials(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Backup(_) | Self::Export(_) | Self::Import(_) | Self::FileSync(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Conflict { .. } | Self::CancellationUnsupported(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotRunning(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string(),
        }))
    }
}
