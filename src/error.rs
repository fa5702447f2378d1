use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("request body must be a JSON object")]
    NotAnObject,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::InvalidJson(_) | ServiceError::NotAnObject => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
