// Route exports
pub mod matchmaking;

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse};

use crate::models::ErrorResponse;

pub use matchmaking::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(matchmaking::configure);
}

/// JSON body rejected before reaching a handler
#[derive(Debug)]
pub struct BadRequestBody(String);

impl std::fmt::Display for BadRequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bad request body: {}", self.0)
    }
}

impl std::error::Error for BadRequestBody {}

impl error::ResponseError for BadRequestBody {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().json(ErrorResponse::bad_request())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    BadRequestBody(err.to_string()).into()
}
