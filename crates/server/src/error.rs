// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stemsplit_core::{ToolError, ValidationError};
use thiserror::Error;

use crate::jobs::SubmitError;
use crate::metrics;

/// Structured JSON error body shared by every endpoint.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job not ready: {0}")]
    JobNotReady(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Busy(#[from] SubmitError),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
                )
            }
            ApiError::JobNotReady(id) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::with_details("Job not ready", format!("Job ID: {id}")),
            ),
            ApiError::FileNotFound(name) => {
                tracing::warn!(file = %name, "File not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("File not found", name.clone()),
                )
            }
            ApiError::Validation(err) => {
                tracing::warn!(error = %err, "Upload rejected");
                metrics::record_rejection(rejection_reason(err));
                (StatusCode::BAD_REQUEST, ErrorResponse::new(err.to_string()))
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, ErrorResponse::new(msg.clone()))
            }
            ApiError::Busy(err) => {
                tracing::warn!(error = %err, "Job pool saturated");
                metrics::record_rejection("busy");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new(err.to_string()),
                )
            }
            ApiError::JobFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(msg.clone()),
            ),
            ApiError::Tool(err) => {
                tracing::error!(error = %err, "External tool failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(err.to_string()),
                )
            }
            ApiError::Io(err) => {
                tracing::error!(error = %err, "IO error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

fn rejection_reason(err: &ValidationError) -> &'static str {
    match err {
        ValidationError::TooLarge { .. } => "too_large",
        ValidationError::UnsupportedExtension { .. } => "extension",
        ValidationError::TooLong { .. } => "too_long",
        ValidationError::MissingFile => "missing_file",
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_job_not_found_returns_404() {
        let id = Uuid::new_v4().to_string();
        let (status, body) =
            extract_response(ApiError::JobNotFound(id.clone()).into_response()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert_eq!(body.error, "Job not found");
        assert!(body.details.unwrap().contains(&id));
    }

    #[tokio::test]
    async fn test_validation_error_returns_400_with_message() {
        let error = ApiError::from(ValidationError::TooLarge {
            size_mb: 51,
            max_mb: 50,
        });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.error,
            "File too large (51MB). Maximum allowed size is 50MB."
        );
    }

    #[tokio::test]
    async fn test_saturation_returns_503() {
        let error = ApiError::from(SubmitError::Saturated { in_flight: 4 });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.error.contains("4 jobs"));
    }

    #[tokio::test]
    async fn test_tool_error_returns_500_with_message() {
        let error = ApiError::from(ToolError::NonZeroExit {
            tool: "yt-dlp".into(),
            code: Some(1),
        });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "yt-dlp exited with code 1");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (status, body) =
            extract_response(ApiError::Internal("lock poisoned".into()).into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_string(&ErrorResponse::new("Test error")).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"Test error\""));
        assert!(!json.contains("details"));
    }
}
