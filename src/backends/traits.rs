//! Backend traits and descriptor types

use crate::config::ResolvedConfig;
use crate::network::HttpClient;
use crate::results::Printable;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Capability contract every provider adapter implements
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name, recorded on every produced instance
    fn name(&self) -> &str;

    /// Cache key for `pattern`, including any configuration that changes the
    /// result for the same pattern (namespace, datacenter, endpoint, ...)
    fn cache_key_name(&self, pattern: &str) -> String {
        pattern.to_string()
    }

    /// List instances whose name matches `pattern`.
    ///
    /// Implementations should stop in-flight work once `cancel` fires.
    async fn list(&self, pattern: &str, cancel: &CancellationToken) -> anyhow::Result<Printable>;
}

/// Factory building a backend from its resolved configuration
pub type BackendFactory =
    Arc<dyn Fn(&ResolvedConfig, &HttpClient) -> anyhow::Result<Box<dyn Backend>> + Send + Sync>;

/// Where an option is hidden
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptionVisibility {
    #[default]
    Visible,
    HideCommandLine,
    HideConfigurator,
    HideBoth,
}

/// Example value shown for an option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionExample {
    pub value: String,
    pub help: String,
}

/// A configuration option declared by a backend
#[derive(Debug, Clone, Default)]
pub struct BackendOption {
    /// Name in snake_case
    pub name: String,
    /// Help text; the first line is the short form
    pub help: String,
    /// Default value
    pub default: Option<String>,
    /// Example values
    pub examples: Vec<OptionExample>,
    /// Must resolve to a non-empty value
    pub required: bool,
    /// Value is a secret
    pub is_password: bool,
    /// Only shown in advanced mode
    pub advanced: bool,
    /// Environment variable and flag are not namespaced by the backend prefix
    pub no_prefix: bool,
    pub hide: OptionVisibility,
}

impl BackendOption {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            ..Default::default()
        }
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn example(mut self, value: impl Into<String>, help: impl Into<String>) -> Self {
        self.examples.push(OptionExample {
            value: value.into(),
            help: help.into(),
        });
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn password(mut self) -> Self {
        self.is_password = true;
        self
    }

    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }

    pub fn no_prefix(mut self) -> Self {
        self.no_prefix = true;
        self
    }

    pub fn hidden(mut self, hide: OptionVisibility) -> Self {
        self.hide = hide;
        self
    }

    /// Command-line flag name, e.g. `consul-token`
    pub fn flag_name(&self, prefix: &str) -> String {
        let name = self.name.replace('_', "-");
        if self.no_prefix {
            name
        } else {
            format!("{}-{}", prefix, name)
        }
    }

    /// Environment variable name, e.g. `HONEY_CONSUL_TOKEN`
    pub fn env_var_name(&self, prefix: &str) -> String {
        option_to_env(&format!("{}-{}", prefix, self.name))
    }
}

/// Convert an option name into its `HONEY_*` environment variable
pub fn option_to_env(name: &str) -> String {
    format!("HONEY_{}", name.replace('-', "_").to_uppercase())
}

/// Convert a config section and option into `HONEY_CONFIG_<SECTION>_<OPTION>`
pub fn config_to_env(section: &str, name: &str) -> String {
    format!(
        "HONEY_CONFIG_{}",
        format!("{}_{}", section, name).replace('-', "_").to_uppercase()
    )
}

/// Registration record for one backend type
#[derive(Clone)]
pub struct BackendDescriptor {
    /// Canonical name
    pub name: String,
    /// Alias used for lookup and option namespacing
    pub prefix: String,
    pub description: String,
    /// Declared options, in display order
    pub options: Vec<BackendOption>,
    factory: BackendFactory,
}

impl BackendDescriptor {
    /// Create a descriptor; prefix and description default to the name
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ResolvedConfig, &HttpClient) -> anyhow::Result<Box<dyn Backend>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        Self {
            prefix: name.clone(),
            description: name.clone(),
            name,
            options: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.prefix = prefix;
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_option(mut self, option: BackendOption) -> Self {
        self.options.push(option);
        self
    }

    /// Find a declared option by name
    pub fn option(&self, name: &str) -> Option<&BackendOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Whether `name` refers to this backend, by name or prefix
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.prefix == name
    }

    /// Build a backend instance
    pub fn instantiate(
        &self,
        config: &ResolvedConfig,
        client: &HttpClient,
    ) -> anyhow::Result<Box<dyn Backend>> {
        (self.factory)(config, client)
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("description", &self.description)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
