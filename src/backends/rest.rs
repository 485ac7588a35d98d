//! Generic JSON inventory backend
//!
//! Fetches an array of objects from an HTTP endpoint and maps configurable
//! fields onto instances. Name matching happens client-side.

use super::traits::*;
use crate::config::ResolvedConfig;
use crate::network::{ApiRequest, HttpClient};
use crate::results::{Instance, Printable};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const NAME: &str = "rest";

/// Registration record for the rest backend
pub fn descriptor() -> BackendDescriptor {
    let field = |name: &str, default: &str| {
        BackendOption::new(name, format!("Item field holding the instance {}", default))
            .default_value(default)
            .advanced()
    };

    BackendDescriptor::new(NAME, |config, client| Ok(Box::new(Rest::new(config, client.clone())?)))
        .with_description("Generic JSON inventory endpoint")
        .with_option(
            BackendOption::new("url", "Endpoint returning the instance list")
                .required()
                .example("https://inventory.example.com/api/hosts", "inventory service"),
        )
        .with_option(BackendOption::new("token", "Bearer token").password())
        .with_option(
            BackendOption::new("items_path", "Dot path to the array inside the response, empty for the root")
                .example("data.items", "nested list"),
        )
        .with_option(field("id_field", "id"))
        .with_option(field("name_field", "name"))
        .with_option(field("type_field", "type"))
        .with_option(field("status_field", "status"))
        .with_option(field("private_ip_field", "private_ip"))
        .with_option(field("public_ip_field", "public_ip"))
}

#[derive(Debug, Clone)]
struct FieldMap {
    id: String,
    name: String,
    kind: String,
    status: String,
    private_ip: String,
    public_ip: String,
}

/// Backend bound to one inventory endpoint
pub struct Rest {
    client: HttpClient,
    url: String,
    token: String,
    items_path: String,
    fields: FieldMap,
}

impl Rest {
    pub fn new(config: &ResolvedConfig, client: HttpClient) -> Result<Self> {
        let url = config.require("url")?;
        url::Url::parse(url).with_context(|| format!("invalid inventory url {:?}", url))?;

        let field = |key: &str, default: &str| config.get(key).unwrap_or(default).to_string();

        Ok(Self {
            client,
            url: url.to_string(),
            token: config.get_or_empty("token").to_string(),
            items_path: config.get_or_empty("items_path").to_string(),
            fields: FieldMap {
                id: field("id_field", "id"),
                name: field("name_field", "name"),
                kind: field("type_field", "type"),
                status: field("status_field", "status"),
                private_ip: field("private_ip_field", "private_ip"),
                public_ip: field("public_ip_field", "public_ip"),
            },
        })
    }

    fn to_instance(&self, item: Value) -> Instance {
        let get = |path: &str| lookup(&item, path).map(value_to_string).unwrap_or_default();

        Instance::new(NAME, get(&self.fields.id), get(&self.fields.name))
            .with_kind(get(&self.fields.kind))
            .with_status(get(&self.fields.status))
            .with_private_ip(get(&self.fields.private_ip))
            .with_public_ip(get(&self.fields.public_ip))
            .with_raw(item)
    }
}

/// Follow a dot-separated path into a JSON value
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Backend for Rest {
    fn name(&self) -> &str {
        NAME
    }

    fn cache_key_name(&self, pattern: &str) -> String {
        format!("{}|{}", self.url, pattern)
    }

    async fn list(&self, pattern: &str, cancel: &CancellationToken) -> Result<Printable> {
        let filter = Regex::new(&format!("(?i).*{}.*", pattern))
            .context("failed to compile regular expression from query")?;

        let body: Value = self
            .client
            .get_json(ApiRequest::get(&self.url).bearer(&self.token), cancel)
            .await?;

        let items = match lookup(&body, &self.items_path) {
            Some(Value::Array(items)) => items.clone(),
            _ => anyhow::bail!("no array found at {:?} in response from {}", self.items_path, self.url),
        };

        Ok(items
            .into_iter()
            .map(|item| self.to_instance(item))
            .filter(|instance| filter.is_match(&instance.name))
            .collect())
    }
}
