//! API error type
//!
//! Maps store and chat-engine failures onto HTTP statuses and renders them
//! in the same envelope as successful responses.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parentline_store::{FieldErrors, StoreError};
use thiserror::Error;
use tracing::error;

use super::response::ApiResponse;

/// Message returned for every unexpected failure
pub const INTERNAL_MESSAGE: &str = "An internal server error occurred.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Single-field validation error
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => ApiResponse::<()>::failure(errors.to_string(), Some(errors)),
            Self::Internal(detail) => {
                error!(detail = %detail, "Request failed");
                ApiResponse::failure(INTERNAL_MESSAGE, None)
            }
            other => ApiResponse::failure(other.to_string(), None),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => Self::Validation(errors),
            StoreError::NotFound { entity, .. } => Self::NotFound(format!("{} not found.", entity)),
            StoreError::Forbidden(msg) => Self::Forbidden(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<parentline_core::Error> for ApiError {
    fn from(err: parentline_core::Error) -> Self {
        use parentline_core::Error;
        match err {
            Error::InvalidInput(msg) => Self::invalid("non_field_errors", msg),
            Error::SessionNotFound(_) => Self::NotFound("chat session not found.".to_string()),
            Error::OAuth(msg) => Self::Unauthorized(format!("Social login failed: {}", msg)),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid("query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound("Resource not found.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let mut errors = FieldErrors::new();
        errors.add("name", "This field may not be blank.");
        errors.add("birth_date", "Birth date cannot be in the future.");

        let (status, body) = body_of(ApiError::Validation(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "birth_date: Birth date cannot be in the future.");
        assert_eq!(body["errors"]["name"][0], "This field may not be blank.");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let (status, body) = body_of(ApiError::Internal("disk I/O error".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], INTERNAL_MESSAGE);
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(StoreError::not_found("child", "x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Forbidden("not the author".to_string())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(StoreError::invalid("title", "too long")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::Setup("boom".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_oauth_failure_is_unauthorized() {
        let err = ApiError::from(parentline_core::Error::OAuth("no email".to_string()));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
