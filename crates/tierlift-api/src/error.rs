//! API error types and HTTP response mapping.
//!
//! Error responses carry plain-text detail, matching what webhook senders
//! and the upload page expect.

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use tierlift_core::Error as CoreError;
use tierlift_remediation::RemediationError;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns an error response for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Returns an error response for a missing server setting.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION", message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Prefixes the message with context.
    #[must_use]
    pub fn context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        } else {
            tracing::debug!(code = self.code, message = %self.message, "request rejected");
        }
        let mut response = (self.status, self.message).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            axum::http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidInput(message) => Self::bad_request(message),
            CoreError::NotFound(message) => Self::not_found(message),
            CoreError::Configuration(message) => Self::configuration(message),
            other @ (CoreError::Storage { .. } | CoreError::Internal { .. }) => {
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<RemediationError> for ApiError {
    fn from(value: RemediationError) -> Self {
        match value {
            RemediationError::Configuration { .. } => Self::configuration(value.to_string()),
            RemediationError::InvalidSource { .. }
            | RemediationError::Access { .. }
            | RemediationError::Parse { .. }
            | RemediationError::Encode { .. }
            | RemediationError::Upload { .. } => Self::internal(value.to_string()),
        }
    }
}
