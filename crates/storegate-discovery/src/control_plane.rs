//! The narrow, read-only control-plane surface discovery depends on

use async_trait::async_trait;
use bollard::models::{ContainerInspectResponse, ContainerSummary as EngineSummary};

use crate::error::Result;

/// One entry of the running-container listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
}

impl ContainerSummary {
    /// Whether any of the container's names contains `prefix`
    pub fn name_contains(&self, prefix: &str) -> bool {
        self.names.iter().any(|name| name.contains(prefix))
    }
}

impl From<EngineSummary> for ContainerSummary {
    fn from(summary: EngineSummary) -> Self {
        Self {
            id: summary.id.unwrap_or_default(),
            names: summary.names.unwrap_or_default(),
        }
    }
}

/// Runtime metadata of one inspected container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    /// Container name, as reported (usually with a leading `/`)
    pub name: String,
    /// Primary IP address on the container's network, if any
    pub ip_address: Option<String>,
    /// Configured hostname
    pub hostname: Option<String>,
    /// Environment in `KEY=value` form
    pub env: Vec<String>,
}

impl ContainerDetails {
    /// Value of the first variable in `keys` that is set and non-empty
    pub fn env_value(&self, keys: &[String]) -> Option<String> {
        keys.iter().find_map(|key| {
            self.env.iter().find_map(|entry| match entry.split_once('=') {
                Some((name, value)) if name == key && !value.is_empty() => {
                    Some(value.to_string())
                }
                _ => None,
            })
        })
    }
}

/// Control plane able to enumerate and inspect running processes
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Running containers
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    /// Metadata for one container
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;

    /// No-op round trip proving the connection is live
    async fn ping(&self) -> Result<()>;
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<ContainerInspectResponse> for ContainerDetails {
    fn from(resp: ContainerInspectResponse) -> Self {
        let config = resp.config.unwrap_or_default();
        let network = resp.network_settings.unwrap_or_default();

        // The default bridge reports the address at the top level, user
        // networks (compose) only inside `Networks`.
        let ip_address = non_empty(network.ip_address).or_else(|| {
            let mut networks: Vec<_> = network.networks.unwrap_or_default().into_iter().collect();
            networks.sort_by(|a, b| a.0.cmp(&b.0));
            networks
                .into_iter()
                .find_map(|(_, endpoint)| non_empty(endpoint.ip_address))
        });

        Self {
            id: resp.id.unwrap_or_default(),
            name: resp.name.unwrap_or_default(),
            ip_address,
            hostname: non_empty(config.hostname),
            env: config.env.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn inspect(value: serde_json::Value) -> ContainerDetails {
        serde_json::from_value::<ContainerInspectResponse>(value)
            .unwrap()
            .into()
    }

    #[test]
    fn inspect_prefers_top_level_address() {
        let details = inspect(serde_json::json!({
            "Id": "abc",
            "Name": "/amazin-object-storage-node-1",
            "Config": { "Hostname": "b7e1", "Env": ["MINIO_ACCESS_KEY=ring"] },
            "NetworkSettings": {
                "IPAddress": "172.17.0.2",
                "Networks": { "bridge": { "IPAddress": "172.17.0.9" } }
            }
        }));

        assert_eq!(details.ip_address.as_deref(), Some("172.17.0.2"));
        assert_eq!(details.hostname.as_deref(), Some("b7e1"));
        assert_eq!(details.env, vec!["MINIO_ACCESS_KEY=ring".to_string()]);
    }

    #[test]
    fn inspect_falls_back_to_network_address() {
        let details = inspect(serde_json::json!({
            "Id": "abc",
            "Name": "/deployment-amazin-object-storage-node-2-1",
            "Config": { "Hostname": "", "Env": null },
            "NetworkSettings": {
                "IPAddress": "",
                "Networks": { "deployment_default": { "IPAddress": "172.18.0.3" } }
            }
        }));

        assert_eq!(details.ip_address.as_deref(), Some("172.18.0.3"));
        assert_eq!(details.hostname, None);
        assert!(details.env.is_empty());
    }

    #[test]
    fn env_value_keeps_equals_signs_in_value() {
        let details = ContainerDetails {
            env: vec![
                "PATH=/usr/bin".to_string(),
                "MINIO_SECRET_KEY=abc=def==".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(
            details.env_value(&["MINIO_SECRET_KEY".to_string()]),
            Some("abc=def==".to_string())
        );
    }

    #[test]
    fn env_value_honours_key_order_and_skips_empty() {
        let details = ContainerDetails {
            env: vec![
                "MINIO_ROOT_USER=root".to_string(),
                "MINIO_ACCESS_KEY=".to_string(),
            ],
            ..Default::default()
        };
        let keys = vec!["MINIO_ACCESS_KEY".to_string(), "MINIO_ROOT_USER".to_string()];
        assert_eq!(details.env_value(&keys), Some("root".to_string()));
        assert_eq!(details.env_value(&["OTHER".to_string()]), None);
    }

    #[test]
    fn summary_matches_any_name() {
        let summary: ContainerSummary = serde_json::from_value::<EngineSummary>(serde_json::json!({
            "Id": "abc",
            "Names": ["/alias", "/amazin-object-storage-node-3"],
            "State": "running"
        }))
        .unwrap()
        .into();
        assert_eq!(summary.id, "abc");
        assert!(summary.name_contains("amazin-object-storage-node-"));
        assert!(!summary.name_contains("postgres"));
    }
}
