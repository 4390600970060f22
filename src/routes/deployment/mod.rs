use crate::helpers::JsonResponse;
use actix_web::web;
use serde::de::DeserializeOwned;

pub mod direct;
pub mod tracked;

/// Options are optional: an empty body means defaults. A body that is present
/// but malformed is rejected rather than silently replaced by defaults.
fn options_from_body<T>(body: &web::Bytes) -> Result<T, actix_web::Error>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        tracing::warn!("Rejected deployment options: {}", err);
        JsonResponse::<()>::build().bad_request(format!("Invalid options: {}", err))
    })
}
