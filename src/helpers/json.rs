use actix_web::error::{ErrorBadRequest, ErrorConflict, ErrorInternalServerError, ErrorNotFound};
use actix_web::http::StatusCode;
use actix_web::{web, Error, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct JsonResponse<T> {
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) item: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) list: Option<Vec<T>>,
}

pub(crate) struct JsonResponseBuilder<T> {
    id: Option<String>,
    item: Option<T>,
    list: Option<Vec<T>>,
}

impl<T> JsonResponse<T>
where
    T: Serialize,
{
    pub(crate) fn build() -> JsonResponseBuilder<T> {
        JsonResponseBuilder {
            id: None,
            item: None,
            list: None,
        }
    }
}

impl<T> JsonResponseBuilder<T>
where
    T: Serialize,
{
    pub(crate) fn set_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub(crate) fn set_item(mut self, item: T) -> Self {
        self.item = Some(item);
        self
    }

    pub(crate) fn set_list(mut self, list: Vec<T>) -> Self {
        self.list = Some(list);
        self
    }

    fn into_body(self, message: impl Into<String>) -> JsonResponse<T> {
        JsonResponse {
            message: message.into(),
            id: self.id,
            item: self.item,
            list: self.list,
        }
    }

    pub(crate) fn ok(self, message: impl Into<String>) -> web::Json<JsonResponse<T>> {
        web::Json(self.into_body(message))
    }

    /// Envelope with an explicit status, for responses that carry a body on
    /// both the success and the failure path.
    pub(crate) fn respond(self, status: StatusCode, message: impl Into<String>) -> HttpResponse {
        HttpResponse::build(status).json(self.into_body(message))
    }

    pub(crate) fn accepted(self, message: impl Into<String>) -> HttpResponse {
        self.respond(StatusCode::ACCEPTED, message)
    }

    pub(crate) fn bad_request(self, message: impl Into<String>) -> Error {
        ErrorBadRequest(self.error_body(message))
    }

    pub(crate) fn not_found(self, message: impl Into<String>) -> Error {
        ErrorNotFound(self.error_body(message))
    }

    pub(crate) fn conflict(self, message: impl Into<String>) -> Error {
        ErrorConflict(self.error_body(message))
    }

    pub(crate) fn internal_server_error(self, message: impl Into<String>) -> Error {
        ErrorInternalServerError(self.error_body(message))
    }

    fn error_body(self, message: impl Into<String>) -> String {
        serde_json::to_string(&self.into_body(message))
            .unwrap_or_else(|_| r#"{"message":"Internal error"}"#.to_string())
    }
}
