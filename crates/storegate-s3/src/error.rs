//! Error types for S3 calls

use thiserror::Error;

/// Result type alias for S3 calls
pub type Result<T> = std::result::Result<T, S3Error>;

/// Errors that can occur while talking to an S3 backend
#[derive(Error, Debug)]
pub enum S3Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Bucket name or endpoint rejected
    #[error("Invalid bucket: {0}")]
    InvalidBucket(String),

    /// Backend returned an error response
    #[error("S3 error {status} {code}: {message}")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl S3Error {
    /// Create a service error from status code and S3 error code/message
    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServiceError {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// HTTP status of a service error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServiceError { status, .. } => Some(*status),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// S3 error code of a service error, e.g. `NoSuchKey`
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::ServiceError { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Whether the backend reported the key or bucket as absent
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
            || matches!(self.code(), Some("NoSuchKey") | Some("NoSuchBucket"))
    }
}
