//! HTTP error responses

use crate::error::BrowseError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Browse(#[from] BrowseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
    status: u16,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: &'static str,
    reason: String,
}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            Self::Browse(BrowseError::PermissionDenied(_)) => "permission_denied",
            Self::Browse(BrowseError::NoIndexes) => "no_indexes",
            Self::Browse(BrowseError::InvalidPage(_)) => "invalid_page",
            Self::Browse(BrowseError::NotFound(_)) => "not_found",
            Self::Browse(BrowseError::Backend(_)) => "backend_error",
            Self::Internal(_) => "internal_server_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Browse(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            Self::Browse(BrowseError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            Self::Browse(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                error_type: self.error_type(),
                reason: self.to_string(),
            },
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl IntoResponse for BrowseError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
