//! Backend registry for looking up descriptors by name or prefix

use super::traits::BackendDescriptor;
use super::{consul, rest};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("didn't find backend called {0:?}")]
    NotFound(String),
    #[error("backend {name:?} collides with registered backend {existing:?}")]
    Duplicate { name: String, existing: String },
}

/// Registry of all available backend types
///
/// Registration needs `&mut self`, so once the registry is shared behind an
/// `Arc` it is frozen.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    descriptors: Vec<Arc<BackendDescriptor>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend shipped in this crate
    pub fn with_builtin() -> Result<Self, RegistryError> {
        Self::with_descriptors([consul::descriptor(), rest::descriptor()])
    }

    /// Registry holding `descriptors`, failing on the first collision
    pub fn with_descriptors<I>(descriptors: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = BackendDescriptor>,
    {
        let mut registry = Self::new();
        for descriptor in descriptors {
            tracing::debug!("Registering backend {}", descriptor.name);
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Register a backend type
    pub fn register(&mut self, descriptor: BackendDescriptor) -> Result<(), RegistryError> {
        if let Some(existing) = self.descriptors.iter().find(|d| {
            d.matches(&descriptor.name) || d.matches(&descriptor.prefix)
        }) {
            return Err(RegistryError::Duplicate {
                name: descriptor.name,
                existing: existing.name.clone(),
            });
        }

        self.descriptors.push(Arc::new(descriptor));
        Ok(())
    }

    /// Look up a backend by name or prefix
    pub fn find(&self, name: &str) -> Result<Arc<BackendDescriptor>, RegistryError> {
        self.descriptors
            .iter()
            .find(|d| d.matches(name))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Backend names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BackendDescriptor>> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
