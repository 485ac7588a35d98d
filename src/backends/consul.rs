//! Consul catalog backend
//!
//! Lists catalog nodes whose name contains the pattern and reports the
//! aggregated health of each node.

use super::traits::*;
use crate::config::ResolvedConfig;
use crate::network::{ApiRequest, HttpClient};
use crate::results::{Instance, Printable};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const NAME: &str = "consul";

const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8500";
const NODE_MAINTENANCE: &str = "_node_maintenance";
const SERVICE_MAINTENANCE_PREFIX: &str = "_service_maintenance:";

/// Registration record for the consul backend
pub fn descriptor() -> BackendDescriptor {
    BackendDescriptor::new(NAME, |config, client| Ok(Box::new(Consul::new(config, client.clone())?)))
        .with_description("Consul by HashiCorp")
        .with_option(
            BackendOption::new("address", "Address of the Consul server")
                .default_value(DEFAULT_ADDRESS)
                .example("https://consul.example.com:8501", "TLS endpoint"),
        )
        .with_option(BackendOption::new("datacenter", "Datacenter to use"))
        .with_option(
            BackendOption::new("token", "ACL token sent with every request").password(),
        )
        .with_option(
            BackendOption::new("namespace", "Namespace to query (Consul Enterprise)").advanced(),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogNode {
    #[serde(rename = "ID", default)]
    id: String,
    node: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    tagged_addresses: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthCheck {
    #[serde(rename = "CheckID", default)]
    check_id: String,
    #[serde(default)]
    status: String,
}

/// Consul catalog backend bound to one agent address
pub struct Consul {
    client: HttpClient,
    address: Url,
    datacenter: String,
    token: String,
    namespace: String,
}

impl Consul {
    pub fn new(config: &ResolvedConfig, client: HttpClient) -> Result<Self> {
        let address = config.get("address").unwrap_or(DEFAULT_ADDRESS);
        let address = Url::parse(address).with_context(|| format!("invalid consul address {:?}", address))?;
        if address.cannot_be_a_base() {
            anyhow::bail!("invalid consul address {:?}", address.as_str());
        }

        Ok(Self {
            client,
            address,
            datacenter: config.get_or_empty("datacenter").to_string(),
            token: config.get_or_empty("token").to_string(),
            namespace: config.get_or_empty("namespace").to_string(),
        })
    }

    /// Agent URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.address.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }

    fn request(&self, segments: &[&str]) -> ApiRequest {
        let mut request = ApiRequest::get(self.endpoint(segments));
        if !self.token.is_empty() {
            request = request.header("X-Consul-Token", &self.token);
        }
        if !self.datacenter.is_empty() {
            request = request.param("dc", &self.datacenter);
        }
        if !self.namespace.is_empty() {
            request = request.param("ns", &self.namespace);
        }
        request
    }

    async fn node_status(&self, node: &str, cancel: &CancellationToken) -> Result<String> {
        let checks: Vec<HealthCheck> = self
            .client
            .get_json(self.request(&["v1", "health", "node", node]), cancel)
            .await?;
        Ok(aggregated_status(&checks).to_string())
    }
}

/// Catalog filter expression matching node names containing `pattern`
fn node_filter(pattern: &str) -> String {
    format!(
        "Node contains \"{}\"",
        pattern.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

/// Collapse a node's checks into one status, maintenance first
fn aggregated_status(checks: &[HealthCheck]) -> &'static str {
    let mut warning = false;
    let mut critical = false;

    for check in checks {
        if check.check_id == NODE_MAINTENANCE || check.check_id.starts_with(SERVICE_MAINTENANCE_PREFIX) {
            return "maintenance";
        }
        match check.status.as_str() {
            "warning" => warning = true,
            "critical" => critical = true,
            _ => {}
        }
    }

    if critical {
        "critical"
    } else if warning {
        "warning"
    } else {
        "passing"
    }
}

#[async_trait]
impl Backend for Consul {
    fn name(&self) -> &str {
        NAME
    }

    fn cache_key_name(&self, pattern: &str) -> String {
        let datacenter = if self.datacenter.is_empty() {
            "default"
        } else {
            &self.datacenter
        };
        format!("{}/{}/{}", datacenter, self.namespace, pattern)
    }

    async fn list(&self, pattern: &str, cancel: &CancellationToken) -> Result<Printable> {
        let request = self
            .request(&["v1", "catalog", "nodes"])
            .param("filter", node_filter(pattern));
        let raw_nodes: Vec<serde_json::Value> = self.client.get_json(request, cancel).await?;

        let mut instances = Printable::new();
        for raw in raw_nodes {
            let node: CatalogNode = serde_json::from_value(raw.clone())?;
            let status = self.node_status(&node.node, cancel).await?;

            let public_ip = node
                .tagged_addresses
                .as_ref()
                .and_then(|tags| tags.get("wan"))
                .filter(|wan| **wan != node.address)
                .cloned()
                .unwrap_or_default();

            instances.push(
                Instance::new(NAME, node.id, node.node)
                    .with_kind("node")
                    .with_status(status)
                    .with_private_ip(node.address)
                    .with_public_ip(public_ip)
                    .with_raw(raw),
            );
        }

        Ok(instances)
    }
}
