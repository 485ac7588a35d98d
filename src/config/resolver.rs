//! Resolution of backend option values from environment, settings and defaults

use super::settings::Settings;
use crate::backends::{config_to_env, option_to_env, BackendDescriptor, BackendRegistry, RegistryError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("backend {backend:?} is missing required option {option:?}")]
    MissingOption { backend: String, option: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Final option values handed to a backend factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    values: BTreeMap<String, String>,
}

impl ResolvedConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value or empty string
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Value of a required option
    pub fn require(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("option {:?} is not set", key))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResolvedConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A backend identifier resolved to its descriptor and settings section
#[derive(Debug, Clone)]
pub struct BackendTarget {
    pub descriptor: Arc<BackendDescriptor>,
    pub section: String,
}

/// Resolves backend identifiers and option values
#[derive(Clone)]
pub struct ConfigResolver {
    settings: Arc<Settings>,
    env: EnvLookup,
}

impl ConfigResolver {
    /// Resolver reading the process environment
    pub fn new(settings: Arc<Settings>) -> Self {
        Self::with_env(settings, |key| std::env::var(key).ok())
    }

    /// Resolver with a custom environment lookup
    pub fn with_env<F>(settings: Arc<Settings>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            settings,
            env: Arc::new(env),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Map an identifier to a backend type.
    ///
    /// A settings section with a `type` wins over a registered backend of the
    /// same name, which lets several differently configured copies of one
    /// backend coexist.
    pub fn target(
        &self,
        registry: &BackendRegistry,
        identifier: &str,
    ) -> Result<BackendTarget, RegistryError> {
        if let Some(kind) = self
            .settings
            .section(identifier)
            .and_then(|s| s.kind.as_deref())
            .filter(|k| !k.is_empty())
        {
            return Ok(BackendTarget {
                descriptor: registry.find(kind)?,
                section: identifier.to_string(),
            });
        }

        let descriptor = registry.find(identifier)?;
        Ok(BackendTarget {
            section: descriptor.name.clone(),
            descriptor,
        })
    }

    /// Resolve every option of `descriptor` for `section`
    pub fn resolve(
        &self,
        descriptor: &BackendDescriptor,
        section: &str,
    ) -> Result<ResolvedConfig, ConfigError> {
        let file_section = self.settings.section(section);
        let mut resolved = ResolvedConfig::default();

        for option in &descriptor.options {
            let value = self
                .lookup_env(&config_to_env(section, &option.name))
                .or_else(|| {
                    option
                        .no_prefix
                        .then(|| self.lookup_env(&option_to_env(&option.name)))
                        .flatten()
                })
                .or_else(|| self.lookup_env(&option.env_var_name(&descriptor.prefix)))
                .or_else(|| file_section.and_then(|s| s.get(&option.name)))
                .or_else(|| option.default.clone());

            match value {
                Some(value) => resolved.set(option.name.clone(), value),
                None if option.required => {
                    return Err(ConfigError::MissingOption {
                        backend: section.to_string(),
                        option: option.name.clone(),
                    })
                }
                None => {}
            }
        }

        // undeclared keys pass through untouched
        if let Some(file_section) = file_section {
            for key in file_section.options.keys() {
                if descriptor.option(key).is_none() {
                    if let Some(value) = file_section.get(key) {
                        resolved.set(key.clone(), value);
                    }
                }
            }
        }

        Ok(resolved)
    }

    fn lookup_env(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendOption;
    use std::collections::HashMap;

    fn descriptor() -> BackendDescriptor {
        BackendDescriptor::new("consul", |_, _| anyhow::bail!("not built in tests"))
            .with_option(BackendOption::new("address", "Address").default_value("http://127.0.0.1:8500"))
            .with_option(BackendOption::new("datacenter", "Datacenter"))
            .with_option(BackendOption::new("token", "Token").password())
            .with_option(BackendOption::new("region", "Region").no_prefix())
    }

    fn resolver(yaml: &str, env: &[(&str, &str)]) -> ConfigResolver {
        let settings = Arc::new(Settings::from_yaml(yaml).unwrap());
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigResolver::with_env(settings, move |key| env.get(key).cloned())
    }

    const YAML: &str = r#"
backends:
  consul:
    datacenter: dc-file
    extra: passthrough
  consul-eu:
    type: consul
    address: http://eu:8500
"#;

    #[test]
    fn test_defaults_and_file_values() {
        let resolver = resolver(YAML, &[]);
        let config = resolver.resolve(&descriptor(), "consul").unwrap();
        assert_eq!(config.get("address"), Some("http://127.0.0.1:8500"));
        assert_eq!(config.get("datacenter"), Some("dc-file"));
        assert_eq!(config.get("token"), None);
        assert_eq!(config.get("extra"), Some("passthrough"));
    }

    #[test]
    fn test_environment_precedence() {
        let resolver = resolver(
            YAML,
            &[
                ("HONEY_CONSUL_DATACENTER", "dc-env"),
                ("HONEY_CONFIG_CONSUL_TOKEN", "t-section"),
                ("HONEY_CONSUL_TOKEN", "t-option"),
                ("HONEY_REGION", "eu-west"),
            ],
        );
        let config = resolver.resolve(&descriptor(), "consul").unwrap();
        assert_eq!(config.get("datacenter"), Some("dc-env"));
        assert_eq!(config.get("token"), Some("t-section"));
        assert_eq!(config.get("region"), Some("eu-west"));
    }

    #[test]
    fn test_missing_required_option() {
        let descriptor = descriptor().with_option(BackendOption::new("url", "URL").required());
        let err = resolver(YAML, &[]).resolve(&descriptor, "consul").unwrap_err();
        assert!(matches!(err, ConfigError::MissingOption { ref option, .. } if option == "url"));
    }

    #[test]
    fn test_target_prefers_typed_section() {
        let mut registry = BackendRegistry::new();
        registry.register(descriptor()).unwrap();
        let resolver = resolver(YAML, &[]);

        let target = resolver.target(&registry, "consul-eu").unwrap();
        assert_eq!(target.descriptor.name, "consul");
        assert_eq!(target.section, "consul-eu");
        let config = resolver.resolve(&target.descriptor, &target.section).unwrap();
        assert_eq!(config.get("address"), Some("http://eu:8500"));

        let target = resolver.target(&registry, "consul").unwrap();
        assert_eq!(target.section, "consul");

        assert!(resolver.target(&registry, "aws").is_err());
    }

    #[test]
    fn test_resolved_config_helpers() {
        let config: ResolvedConfig = [("flag", "True"), ("url", "")].into_iter().collect();
        assert_eq!(config.get("flag"), Some("True"));
        assert!(config.require("url").is_err());
        assert_eq!(config.get_or_empty("missing"), "");
    }
}
