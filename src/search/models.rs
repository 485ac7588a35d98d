//! Find request and error types

use crate::backends::RegistryError;
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// One find invocation: which backends to ask and what to match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindRequest {
    /// Backend identifiers (registered names, prefixes or settings sections)
    pub backends: Vec<String>,
    /// Name pattern handed to every backend
    pub pattern: String,
    /// Skip cache reads; live results are still written back
    #[serde(default)]
    pub no_cache: bool,
}

impl FindRequest {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    /// Add a backend to the request
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.backends.push(name.into());
        self
    }

    pub fn with_backends<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backends.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Requested identifiers with duplicates and blanks removed, first
    /// occurrence kept
    pub fn distinct_backends(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.backends
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty() && seen.insert(*b))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum FindError {
    #[error("no backends requested")]
    NoBackends,
    #[error(transparent)]
    UnknownBackend(#[from] RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to initialize backend {backend:?}: {error:#}")]
    Init { backend: String, error: anyhow::Error },
    #[error("backend {backend:?} failed: {error:#}")]
    Query { backend: String, error: anyhow::Error },
    #[error("find was cancelled")]
    Cancelled,
    #[error("backend query task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FindError {
    /// Backend the error is attributed to, if any
    pub fn backend(&self) -> Option<&str> {
        match self {
            Self::Init { backend, .. } | Self::Query { backend, .. } => Some(backend.as_str()),
            Self::UnknownBackend(RegistryError::NotFound(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}
