use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::validation::FieldIssue;

/// Everything a handler can fail with. Store detail is logged at the call
/// site and never echoed to the client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Too many requests")]
    RateLimited,

    #[error("Validation failed")]
    Validation(Vec<FieldIssue>),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Store(&'static str),

    #[error("Invalid request")]
    MalformedRequest,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) | ApiError::MalformedRequest => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ApiError::Validation(issues) => json!({
                "error": self.to_string(),
                "issues": issues,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
