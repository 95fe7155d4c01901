//! Error taxonomy shared by every storegate layer
//!
//! Each layer wraps failures with its own context (object id, node index)
//! but never changes their [`ErrorKind`]; the transport layer performs the
//! final kind to status mapping.

use thiserror::Error;

/// Boxed cause attached to wrapped errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while routing a request to a storage backend
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Control plane unreachable, or a list/inspect call failed
    #[error("Discovery unavailable: {context}: {source}")]
    DiscoveryUnavailable {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Discovery succeeded but no backend is running
    #[error("No storage backends available for object {object_id}")]
    NoBackendsAvailable { object_id: String },

    /// One backend's metadata could not be turned into a descriptor
    #[error("Malformed backend {container}: {reason}")]
    MalformedBackend { container: String, reason: String },

    /// The backend confirmed the object does not exist
    #[error("Object not found: {object_id} (node {node_index})")]
    ObjectNotFound { object_id: String, node_index: u32 },

    /// Any other backend I/O failure
    #[error("Backend operation failed on node {node_index}: {operation}: {source}")]
    BackendOperationFailed {
        node_index: u32,
        operation: String,
        #[source]
        source: BoxError,
    },

    /// Caller-side timeout or cancellation
    #[error("Request cancelled: {0}")]
    Cancelled(String),
}

/// Kind of a [`GatewayError`], stable across wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DiscoveryUnavailable,
    NoBackendsAvailable,
    MalformedBackend,
    ObjectNotFound,
    BackendOperationFailed,
    Cancelled,
}

impl ErrorKind {
    /// Snake-case name used in logs and error bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DiscoveryUnavailable => "discovery_unavailable",
            ErrorKind::NoBackendsAvailable => "no_backends_available",
            ErrorKind::MalformedBackend => "malformed_backend",
            ErrorKind::ObjectNotFound => "object_not_found",
            ErrorKind::BackendOperationFailed => "backend_operation_failed",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Returns the HTTP status code for this kind
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::DiscoveryUnavailable => 503,
            ErrorKind::NoBackendsAvailable => 503,
            ErrorKind::MalformedBackend => 500,
            ErrorKind::ObjectNotFound => 404,
            ErrorKind::BackendOperationFailed => 500,
            ErrorKind::Cancelled => 503,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    /// Wrap a control-plane failure
    pub fn discovery(context: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        GatewayError::DiscoveryUnavailable {
            context: context.into(),
            source: cause.into(),
        }
    }

    /// Wrap a backend I/O failure for the given node
    pub fn backend(
        node_index: u32,
        operation: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        GatewayError::BackendOperationFailed {
            node_index,
            operation: operation.into(),
            source: cause.into(),
        }
    }

    /// No backend to route `object_id` to
    pub fn no_backends(object_id: impl Into<String>) -> Self {
        GatewayError::NoBackendsAvailable {
            object_id: object_id.into(),
        }
    }

    /// Object absent on the given node
    pub fn not_found(object_id: impl Into<String>, node_index: u32) -> Self {
        GatewayError::ObjectNotFound {
            object_id: object_id.into(),
            node_index,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::DiscoveryUnavailable { .. } => ErrorKind::DiscoveryUnavailable,
            GatewayError::NoBackendsAvailable { .. } => ErrorKind::NoBackendsAvailable,
            GatewayError::MalformedBackend { .. } => ErrorKind::MalformedBackend,
            GatewayError::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            GatewayError::BackendOperationFailed { .. } => ErrorKind::BackendOperationFailed,
            GatewayError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Prefix the error's context with `context`, keeping its kind.
    ///
    /// Variants that already name the object or carry no context are
    /// returned unchanged.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            GatewayError::DiscoveryUnavailable {
                context: inner,
                source,
            } => GatewayError::DiscoveryUnavailable {
                context: format!("{}: {}", context, inner),
                source,
            },
            GatewayError::BackendOperationFailed {
                node_index,
                operation,
                source,
            } => GatewayError::BackendOperationFailed {
                node_index,
                operation: format!("{}: {}", context, operation),
                source,
            },
            GatewayError::Cancelled(reason) => {
                GatewayError::Cancelled(format!("{}: {}", context, reason))
            }
            other => other,
        }
    }

    /// Whether this error only affects a single discovered backend
    pub fn is_skippable(&self) -> bool {
        matches!(self, GatewayError::MalformedBackend { .. })
    }
}
