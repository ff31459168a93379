//! Error types for yloader
//!
//! This module provides the error taxonomy for the service:
//! - [`Error`] - top-level error returned by fallible library operations
//! - [`FetchError`] - outcome of a single failed fetch attempt
//! - [`UploadError`] - failure of the object storage transfer
//! - HTTP status code mapping and the JSON error body used by the API

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::JobStatus;

/// Result type alias for yloader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for yloader
///
/// Job failures never surface through this type to callers of the submission or
/// status boundaries; they are recorded on the job itself. `Error` covers startup,
/// configuration, and request validation problems.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "PROXY_PORTS")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Job not found
    #[error("job not found: {0}")]
    NotFound(String),

    /// Submitted URL is not an absolute http(s) URL
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// A single fetch attempt failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The object storage transfer failed
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Every fetch attempt failed
    #[error("exhausted retries: download failed after all attempts")]
    ExhaustedRetries,

    /// A status change that the job lifecycle does not allow
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Status the job was in
        from: JobStatus,
        /// Status that was requested
        to: JobStatus,
    },

    /// External tool is unavailable or misconfigured (yt-dlp binary missing, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of one fetch attempt
///
/// The orchestrator treats every variant as a failed attempt and moves on to the
/// next proxy; none of them is terminal on its own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The fetch tool could not be spawned, exited non-zero, or its output stream broke
    #[error("fetch tool failed: {detail}")]
    ToolFailure {
        /// Diagnostic detail (exit status and the tail of stderr when available)
        detail: String,
    },

    /// The tool exited cleanly but no file for the job exists in the output directory
    #[error("output file not found in {dir} after download")]
    OutputMissing {
        /// Directory that was scanned
        dir: PathBuf,
    },

    /// The attempt exceeded its configured deadline
    #[error("attempt timed out after {}s", .after.as_secs())]
    TimedOut {
        /// The deadline that was exceeded
        after: Duration,
    },

    /// The attempt was aborted because the job was cancelled
    #[error("attempt cancelled")]
    Cancelled,
}

/// Failure of the object storage transfer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{detail}")]
pub struct UploadError {
    /// Human-readable failure detail from the storage backend or the local file
    pub detail: String,
}

impl UploadError {
    /// Create an upload error from any displayable cause
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl From<object_store::Error> for UploadError {
    fn from(e: object_store::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        Self::new(format!("failed to read local file: {e}"))
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "job not found: 5a1e..."
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "missing_url")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict
            Error::InvalidTransition { .. } => 409,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - upstream failures
            Error::Fetch(_) => 502,
            Error::Upload(_) => 502,
            Error::ExhaustedRetries => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::NotFound(_) => "not_found",
            Error::InvalidUrl(_) => "invalid_url",
            Error::ShuttingDown => "shutting_down",
            Error::Fetch(e) => match e {
                FetchError::ToolFailure { .. } => "tool_failure",
                FetchError::OutputMissing { .. } => "output_missing",
                FetchError::TimedOut { .. } => "attempt_timed_out",
                FetchError::Cancelled => "cancelled",
            },
            Error::Upload(_) => "upload_failed",
            Error::ExhaustedRetries => "exhausted_retries",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::ExternalTool(_) => "external_tool_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::InvalidTransition { from, to } => Some(serde_json::json!({
                "from": from,
                "to": to,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::config("no proxy ports configured", "PROXY_PORTS"),
                400,
                "config_error",
            ),
            (Error::InvalidUrl("ftp://x".into()), 400, "invalid_url"),
            (Error::NotFound("job 1".into()), 404, "not_found"),
            (
                Error::InvalidTransition {
                    from: JobStatus::Completed,
                    to: JobStatus::Downloading,
                },
                409,
                "invalid_transition",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (Error::ApiServerError("bind".into()), 500, "api_server_error"),
            (Error::Other("x".into()), 500, "internal_error"),
            (
                Error::Fetch(FetchError::ToolFailure {
                    detail: "exit 1".into(),
                }),
                502,
                "tool_failure",
            ),
            (
                Error::Fetch(FetchError::OutputMissing {
                    dir: PathBuf::from("/tmp"),
                }),
                502,
                "output_missing",
            ),
            (
                Error::Upload(UploadError::new("access denied")),
                502,
                "upload_failed",
            ),
            (Error::ExhaustedRetries, 502, "exhausted_retries"),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::ExternalTool("yt-dlp not found".into()),
                503,
                "external_tool_error",
            ),
        ]
    }

    #[test]
    fn test_every_variant_maps_to_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error}");
            assert_eq!(error.error_code(), code, "code for {error}");
        }
    }

    #[test]
    fn test_exhausted_retries_message_is_fixed() {
        assert!(Error::ExhaustedRetries.to_string().contains("exhausted retries"));
    }

    #[test]
    fn test_upload_error_displays_detail_only() {
        let err = UploadError::new("bucket does not exist");
        assert_eq!(err.to_string(), "bucket does not exist");
    }

    #[test]
    fn test_timed_out_reports_seconds() {
        let err = FetchError::TimedOut {
            after: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "attempt timed out after 90s");
    }

    #[test]
    fn test_config_error_carries_key_in_details() {
        let api: ApiError = Error::config("not a number", "PORT").into();
        assert_eq!(api.error.code, "config_error");
        assert_eq!(api.error.details.unwrap()["key"], "PORT");
    }

    #[test]
    fn test_api_error_omits_empty_details() {
        let json = serde_json::to_string(&ApiError::not_found("job abc")).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains("job abc not found"));
    }
}
