//! Backend node descriptor and discovery snapshot types

/// One discovered storage backend and how to reach it.
///
/// Descriptors are plain values: discovery builds fresh ones on every call
/// and nothing mutates them afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendNode {
    /// Ordinal identity parsed from the container name
    pub node_index: u32,
    /// Host or IP reachable on the shared network
    pub address: String,
    /// S3 wire protocol port
    pub port: u16,
    pub access_key: String,
    pub secret_key: String,
    /// Control-plane handle of the backing container
    pub container_id: String,
    /// Configured container hostname, if any
    pub hostname: Option<String>,
}

impl BackendNode {
    /// Base URL of the backend's S3 endpoint
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

impl std::fmt::Debug for BackendNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendNode")
            .field("node_index", &self.node_index)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("container_id", &self.container_id)
            .field("hostname", &self.hostname)
            .finish()
    }
}

/// A backend that matched the naming convention but could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBackend {
    pub container_id: String,
    pub name: String,
    pub reason: String,
}

/// Result of one discovery call
#[derive(Debug, Clone, Default)]
pub struct DiscoverySnapshot {
    /// Usable backends, in control-plane order
    pub nodes: Vec<BackendNode>,
    /// Matched backends that were malformed and left out
    pub skipped: Vec<SkippedBackend>,
}

impl DiscoverySnapshot {
    pub fn new(nodes: Vec<BackendNode>) -> Self {
        Self {
            nodes,
            skipped: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
