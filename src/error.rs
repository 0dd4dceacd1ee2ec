use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// Authentication failures are NOT represented here: the auth gate turns
/// them into bare status codes before any handler runs (see
/// [`crate::auth::AuthRejection`]). These variants cover the upload
/// handler and the analyzer collaborator.
///
/// # Analyzer Errors
///
/// Analyzer failures are split so that callers can tell a down collaborator
/// (`503`) from one that answered with garbage (`502`) or too slowly (`504`).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Uploaded image is empty")]
    EmptyPayload,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("AI analyzer unavailable: {0}")]
    AnalyzerUnavailable(String),

    #[error("AI analyzer returned an invalid response: {0}")]
    AnalyzerResponse(String),

    #[error("AI analyzer timed out: {0}")]
    AnalyzerTimeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::EmptyPayload | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::AnalyzerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::AnalyzerResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::AnalyzerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Full details stay in the server log; clients get a sanitized message.
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let (error_type, message) = match &self {
            AppError::EmptyPayload => ("empty_payload", "Image file is empty".to_string()),
            AppError::BadRequest(msg) => ("bad_request", msg.clone()),
            AppError::PayloadTooLarge => (
                "payload_too_large",
                "Uploaded image is too large".to_string(),
            ),
            AppError::AnalyzerUnavailable(_) => (
                "analyzer_unavailable",
                "AI analysis service is temporarily unavailable. Please try again later."
                    .to_string(),
            ),
            AppError::AnalyzerResponse(_) => (
                "analyzer_error",
                "AI analysis service returned an invalid response.".to_string(),
            ),
            AppError::AnalyzerTimeout(_) => (
                "timeout",
                "AI analysis timed out. Please try again.".to_string(),
            ),
            AppError::Internal(_) => (
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists."
                    .to_string(),
            ),
            AppError::ConfigError(_) => (
                "config_error",
                "Service configuration error. Please contact support.".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_is_client_error() {
        let response = AppError::EmptyPayload.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_analyzer_errors_are_5xx() {
        for err in [
            AppError::AnalyzerUnavailable("connection refused".into()),
            AppError::AnalyzerResponse("no candidates".into()),
            AppError::AnalyzerTimeout("30s".into()),
        ] {
            assert!(err.status_code().is_server_error(), "{err} should be 5xx");
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::AnalyzerUnavailable(String::new()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::AnalyzerResponse(String::new()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::AnalyzerTimeout(String::new()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Internal(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_server_error_body_is_sanitized() {
        use http_body_util::BodyExt;

        let response =
            AppError::AnalyzerUnavailable("tcp connect to 10.0.0.7:443 refused".into())
                .into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "analyzer_unavailable");
        assert!(!json["message"].as_str().unwrap().contains("10.0.0.7"));
    }
}
