//! Settings structures for honey configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main settings structure matching honey.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub cache: CacheSettings,
    pub server: ServerSettings,
    pub outgoing: OutgoingSettings,
    /// Named backend sections, e.g. `consul-eu: { type: consul, ... }`
    pub backends: BTreeMap<String, BackendSection>,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables (HONEY_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("HONEY_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("HONEY_NO_CACHE") {
            self.cache.disabled = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("HONEY_CACHE_TTL") {
            if let Ok(ttl) = val.parse() {
                self.cache.ttl = ttl;
            }
        }
        if let Ok(val) = std::env::var("HONEY_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("HONEY_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
    }

    /// Get a backend section by name
    pub fn section(&self, name: &str) -> Option<&BackendSection> {
        self.backends.get(name)
    }

    /// Sections that select a backend type, in name order
    pub fn typed_sections(&self) -> impl Iterator<Item = (&str, &str)> {
        self.backends.iter().filter_map(|(name, section)| {
            section
                .kind
                .as_deref()
                .filter(|kind| !kind.is_empty())
                .map(|kind| (name.as_str(), kind))
        })
    }
}

/// General settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
}

/// Instance cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Skip reading the cache; live results are still written back
    pub disabled: bool,
    /// Entry lifetime in seconds, 0 keeps entries forever
    pub ttl: u64,
    /// Database file, defaults to ~/.cache/honey-cachedb/cache.db
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            ttl: 600,
            path: None,
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Lifetime of memoized /api/instances responses, in seconds
    pub response_cache_ttl: u64,
    /// Maximum number of memoized responses
    pub response_cache_capacity: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
            response_cache_ttl: 600,
            response_cache_capacity: 100,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Request timeout in seconds
    pub request_timeout: f64,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    pub user_agent: String,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10.0,
            verify_ssl: true,
            user_agent: format!("honey-rs/{}", crate::VERSION),
        }
    }
}

/// A named backend section in the settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    /// Registered backend this section configures
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Option values
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl BackendSection {
    /// Option value rendered as a string; empty values count as unset
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match self.options.get(key)? {
            serde_yaml::Value::Null => return None,
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            other => serde_yaml::to_string(other).ok()?.trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
general:
  debug: true
cache:
  ttl: 30
backends:
  consul-eu:
    type: consul
    address: http://consul.eu:8500
    datacenter: eu-1
  consul:
    token: ""
    port: 8500
"#;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.cache.ttl, 600);
        assert!(!settings.general.debug);
        assert!(settings.backends.is_empty());
    }

    #[test]
    fn test_parse_sections() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();
        assert!(settings.general.debug);
        assert_eq!(settings.cache.ttl, 30);

        let section = settings.section("consul-eu").unwrap();
        assert_eq!(section.kind.as_deref(), Some("consul"));
        assert_eq!(section.get("datacenter").as_deref(), Some("eu-1"));
        assert!(!section.options.contains_key("type"));
    }

    #[test]
    fn test_section_values_as_strings() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();
        let section = settings.section("consul").unwrap();
        assert_eq!(section.get("token"), None);
        assert_eq!(section.get("port").as_deref(), Some("8500"));
        assert_eq!(section.get("missing"), None);
    }

    #[test]
    fn test_typed_sections() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();
        let typed: Vec<_> = settings.typed_sections().collect();
        assert_eq!(typed, vec![("consul-eu", "consul")]);
    }
}
