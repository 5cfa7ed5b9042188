use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

/// API-surface errors; each variant maps to one HTTP status and a JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("no model is loaded; train one and reload")]
    ModelUnavailable,

    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("model reload failed: {0}")]
    Reload(String),
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Prediction(_) | ApiError::Reload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}
