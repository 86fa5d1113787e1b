use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use vanish_db::StoreError;

/// Client-facing error taxonomy. Validation carries the offending field so
/// clients can tell "fix your input" apart from "that id does not exist".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation { field, message } => Self::Validation {
                field,
                message: message.to_string(),
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation { field, message } => {
                let mut errors = serde_json::Map::new();
                errors.insert(field.to_string(), json!(message));
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "errors": errors })),
                )
                    .into_response()
            }
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": format!("{what} not found.") })),
            )
                .into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Conflict(what) => (
                StatusCode::CONFLICT,
                Json(json!({ "message": format!("{what} already exists.") })),
            )
                .into_response(),
            Self::Internal(detail) => {
                error!("Internal error: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
