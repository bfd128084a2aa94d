//! Error types for framecheck
//!
//! Provides a single error enum for the whole audit pipeline with:
//! - Distinct variants for each failure class (input, empty output, format, service)
//! - HTTP status code mapping
//! - Display-safe user messages, separate from low-level diagnostics
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    NoUrls,
    ValidationError,

    // Model output errors (2xxx)
    EmptyResponse,
    InvalidFormat,

    // Service errors (8xxx)
    ServiceOverloaded,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::NoUrls => 1001,
            ErrorCode::ValidationError => 1002,

            ErrorCode::EmptyResponse => 2001,
            ErrorCode::InvalidFormat => 2002,

            ErrorCode::ServiceOverloaded => 8001,
            ErrorCode::UpstreamError => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Failure class of an audit, as surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller supplied no usable input
    Input,
    /// The model answered with no usable text
    EmptyResponse,
    /// Text arrived but could not be normalized
    Format,
    /// The remote call itself failed
    Service,
    /// Misconfiguration or a bug on our side
    Internal,
}

impl ErrorKind {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::Format => "format",
            ErrorKind::Service => "service",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("No article URLs were provided")]
    NoUrls,

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Model output errors
    #[error("Model returned an empty response{}", .reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    EmptyResponse { reason: Option<String> },

    /// `diagnostic` is the original parse failure; it is for logs only.
    #[error("Invalid data format: {diagnostic}")]
    InvalidFormat { diagnostic: String },

    // Service errors
    #[error("Model service overloaded: {message}")]
    ServiceOverloaded { message: String },

    #[error("Model service error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NoUrls => ErrorCode::NoUrls,
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::EmptyResponse { .. } => ErrorCode::EmptyResponse,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::ServiceOverloaded { .. } => ErrorCode::ServiceOverloaded,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the failure class for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NoUrls | AppError::Validation { .. } => ErrorKind::Input,
            AppError::EmptyResponse { .. } => ErrorKind::EmptyResponse,
            AppError::InvalidFormat { .. } => ErrorKind::Format,
            AppError::ServiceOverloaded { .. } | AppError::Upstream { .. } => ErrorKind::Service,
            AppError::Internal { .. } | AppError::Configuration { .. } => ErrorKind::Internal,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::NoUrls | AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 502 Bad Gateway
            AppError::EmptyResponse { .. }
            | AppError::InvalidFormat { .. }
            | AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::ServiceOverloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            AppError::Internal { .. } | AppError::Configuration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for direct display to an end user.
    ///
    /// Never includes parse diagnostics or upstream response bodies.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NoUrls => "Add at least one article URL to run an audit.".to_string(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::EmptyResponse { .. } => {
                "The analysis service returned no result. This can happen when content is \
                 filtered or a source could not be reached. Please try again."
                    .to_string()
            }
            AppError::InvalidFormat { .. } => {
                "The analysis engine returned an invalid data format. Try different article \
                 URLs; pages that are ambiguous or cannot be fetched often cause this."
                    .to_string()
            }
            AppError::ServiceOverloaded { .. } => {
                "The analysis service is overloaded right now. Please retry in a little while."
                    .to_string()
            }
            AppError::Upstream { .. } => {
                "The analysis service could not be reached. Please try again.".to_string()
            }
            AppError::Internal { .. } | AppError::Configuration { .. } => {
                "Engine failure detected during audit.".to_string()
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // The full error (with diagnostics) goes to the log only
        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.user_message(),
                request_id: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NoUrls;
        assert_eq!(err.code(), ErrorCode::NoUrls);
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code().as_code(), 1001);
    }

    #[test]
    fn test_format_error_hides_diagnostic() {
        let err = AppError::InvalidFormat {
            diagnostic: "expected `,` or `}` at line 3 column 7".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("line 3 column 7"));
        assert!(!err.user_message().contains("line 3"));
        assert!(err.user_message().contains("different article URLs"));
    }

    #[test]
    fn test_rate_limit_distinguished() {
        let overloaded = AppError::ServiceOverloaded {
            message: "429".into(),
        };
        let generic = AppError::Upstream {
            status: Some(500),
            message: "boom".into(),
        };
        assert_eq!(overloaded.kind(), ErrorKind::Service);
        assert_eq!(generic.kind(), ErrorKind::Service);
        assert_eq!(overloaded.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(generic.status_code(), StatusCode::BAD_GATEWAY);
        assert_ne!(overloaded.user_message(), generic.user_message());
    }

    #[test]
    fn test_empty_response_message() {
        let err = AppError::EmptyResponse {
            reason: Some("SAFETY".into()),
        };
        assert_eq!(err.to_string(), "Model returned an empty response (SAFETY)");
        assert!(err.user_message().contains("try again"));

        let bare = AppError::EmptyResponse { reason: None };
        assert_eq!(bare.to_string(), "Model returned an empty response");
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_configuration_error_is_internal() {
        let err = AppError::Configuration {
            message: "missing api key".into(),
        };
        assert_eq!(err.code().as_code(), 9002);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.kind().as_str(), "internal");
        assert!(!err.user_message().contains("api key"));
    }
}
