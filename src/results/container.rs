//! Result container for aggregating instances from concurrent backend queries

use super::types::Printable;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared accumulator for instances coming from several backends
///
/// Clones share the same underlying buffer, so each concurrent query task can
/// hold its own handle.
#[derive(Debug, Clone, Default)]
pub struct ResultContainer {
    instances: Arc<Mutex<Printable>>,
}

impl ResultContainer {
    /// Create a new empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every instance of one backend's result
    pub fn add(&self, printable: Printable) {
        self.instances.lock().extend(printable);
    }

    /// Total number of instances collected so far
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the merged result, leaving the container empty
    pub fn take(&self) -> Printable {
        std::mem::take(&mut *self.instances.lock())
    }
}
