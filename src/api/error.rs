use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::DatabaseError;
use crate::pipeline::{user_facing_message, ChatError};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Superseded by a newer request")]
    Superseded,
    #[error("Upstream failure: {details}")]
    Upstream { message: String, details: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone(), None),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, detail.clone(), None),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail.clone(), None),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "I'm getting a lot of questions right now. Please wait a moment and try \
                 sending your message again."
                    .to_string(),
                Some(format!("retry after {retry_after}s")),
            ),
            ApiError::Superseded => (
                StatusCode::CONFLICT,
                "A newer message replaced this one.".to_string(),
                None,
            ),
            ApiError::Upstream { message, details } => (
                StatusCode::BAD_GATEWAY,
                message.clone(),
                Some(details.clone()),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut response = (status, Json(ErrorBody { error, details })).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::MissingInput => ApiError::BadRequest("Message is required".into()),
            ChatError::PatientMismatch(id) => {
                ApiError::Forbidden(format!("Patient {id} does not belong to this account"))
            }
            ChatError::ConversationNotFound(id) => {
                ApiError::NotFound(format!("Conversation {id} not found"))
            }
            ChatError::RateLimited { retry_after } => ApiError::RateLimited {
                retry_after: *retry_after,
            },
            ChatError::Upstream { .. } if err.is_rate_exhaustion() => {
                ApiError::RateLimited { retry_after: 60 }
            }
            ChatError::Database(DatabaseError::NotFound { entity_type, id }) => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            ChatError::Database(db) => ApiError::Internal(db.to_string()),
            _ => ApiError::Upstream {
                message: user_facing_message(&err),
                details: err.to_string(),
            },
        }
    }
}
