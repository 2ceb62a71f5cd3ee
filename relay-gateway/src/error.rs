//! Error types for the gateway crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Structured payload attached to processing failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingDetails {
    /// What went wrong, if the engine said.
    pub error: Option<String>,
    /// Terminal status the engine reported, if any.
    pub status: Option<String>,
}

/// Errors that can occur during gateway request handling.
///
/// Every variant maps to exactly one HTTP response.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The request did not use POST.
    #[error("Method not allowed. Use POST.")]
    MethodNotAllowed,

    /// No protocol source or no host header.
    #[error("Missing required headers: x-forwarded-proto or host.")]
    MissingHeaders,

    /// The body is empty, `null`, or not JSON.
    #[error("Request body missing.")]
    BodyMissing,

    /// The body lacks a valid `type` or a non-empty `task`.
    #[error("Request body must contain \"type\" and \"task\" for task invocation.")]
    InvalidBody,

    /// The worker context could not be constructed.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// The engine failed, timed out, or never reported a status.
    #[error("Task processing failed")]
    Processing(ProcessingDetails),

    /// Start-up configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// A processing failure carrying `error` and no status.
    #[must_use]
    pub fn processing(error: impl Into<String>) -> Self {
        Self::Processing(ProcessingDetails { error: Some(error.into()), status: None })
    }

    /// HTTP status this error is reported with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingHeaders | Self::BodyMissing | Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::Handler(_) | Self::Processing(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Processing(details) => json!({"error": self.to_string(), "details": details}),
            _ => json!({"error": self.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = match axum::body::to_bytes(resp.into_body(), 4096).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => panic!("invalid JSON: {e}"),
        }
    }

    #[test]
    fn gateway_error_status_codes_map_correctly() {
        assert_eq!(GatewayError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(GatewayError::MissingHeaders.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::BodyMissing.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::InvalidBody.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::Handler("x".to_owned()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::processing("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "engine errors must map to 500"
        );
    }

    #[tokio::test]
    async fn handler_error_prefixes_details() {
        let resp = GatewayError::Handler("bad base URL".to_owned()).into_response();
        let body = body_json(resp).await;
        assert_eq!(body, json!({"error": "Handler failed: bad base URL"}));
    }

    #[tokio::test]
    async fn processing_error_carries_details() {
        let resp = GatewayError::processing("connection refused").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Task processing failed");
        assert_eq!(body["details"], json!({"error": "connection refused", "status": null}));
    }

    #[tokio::test]
    async fn validation_errors_have_no_details() {
        let body = body_json(GatewayError::BodyMissing.into_response()).await;
        assert_eq!(body, json!({"error": "Request body missing."}));
    }

    #[tokio::test]
    async fn invalid_body_names_both_fields() {
        let body = body_json(GatewayError::InvalidBody.into_response()).await;
        assert_eq!(
            body,
            json!({"error": "Request body must contain \"type\" and \"task\" for task invocation."})
        );
    }
}
