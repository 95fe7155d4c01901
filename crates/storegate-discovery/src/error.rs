//! Error types for control-plane calls

use thiserror::Error;

/// Result type alias for control-plane calls
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

/// Errors that can occur while talking to the control plane
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    /// Transport or decoding failure in the Docker client
    #[error("Docker request failed: {0}")]
    Docker(#[source] bollard::errors::Error),

    /// Host this client cannot connect to
    #[error("Unsupported control plane host: {0}")]
    UnsupportedHost(String),

    /// Control plane returned an error response
    #[error("Control plane error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Container vanished between listing and inspection
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
}

impl ControlPlaneError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }
}

impl From<bollard::errors::Error> for ControlPlaneError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            } => Self::server_error(status_code, message),
            other => Self::Docker(other),
        }
    }
}
