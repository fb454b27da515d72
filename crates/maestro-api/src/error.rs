//! API error handling: maps core/db errors onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<maestro_core::Error> for ApiError {
    fn from(err: maestro_core::Error) -> Self {
        match err {
            maestro_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            maestro_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            maestro_core::Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<maestro_db::DbError> for ApiError {
    fn from(err: maestro_db::DbError) -> Self {
        match err {
            maestro_db::DbError::NotFound(msg) => ApiError::NotFound(msg),
            maestro_db::DbError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
