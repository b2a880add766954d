//! Error responses for the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lexicon_common::EntityType;
use serde_json::json;
use std::str::FromStr;

/// Handler error, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    InvalidEntityType(String),
    BadRequest(String),
    NotFound(String),
    /// The engine reported a failed write; details are in the service log
    OperationFailed(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidEntityType(value) => {
                (StatusCode::BAD_REQUEST, format!("Invalid entity type: {}", value))
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::OperationFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Parse an entity type path segment
pub fn parse_entity_type(value: &str) -> Result<EntityType, ApiError> {
    EntityType::from_str(value).map_err(|_| ApiError::InvalidEntityType(value.to_string()))
}
