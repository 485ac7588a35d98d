//! Instance and printable collection types

use super::flatten::FlattenData;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names every instance exposes, in display order.
///
/// `raw` is deliberately absent: it is carried in the flattened form but is
/// never a column.
pub const INSTANCE_FIELDS: [&str; 7] = [
    "id",
    "backend_name",
    "name",
    "type",
    "status",
    "private_ip",
    "public_ip",
];

/// A single discovered compute instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Provider-assigned identifier
    pub id: String,
    /// Backend that produced this record
    pub backend_name: String,
    /// Display name
    pub name: String,
    /// Instance kind (node, pod, vm, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Provider status string
    pub status: String,
    /// Private network address
    #[serde(default)]
    pub private_ip: String,
    /// Public network address
    #[serde(default)]
    pub public_ip: String,
    /// Provider-native object
    #[serde(default)]
    pub raw: Value,
}

impl Instance {
    pub fn new(
        backend_name: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            backend_name: backend_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_private_ip(mut self, ip: impl Into<String>) -> Self {
        self.private_ip = ip.into();
        self
    }

    pub fn with_public_ip(mut self, ip: impl Into<String>) -> Self {
        self.public_ip = ip.into();
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    /// Values of the display columns, in [`INSTANCE_FIELDS`] order
    pub fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.backend_name.clone(),
            self.name.clone(),
            self.kind.clone(),
            self.status.clone(),
            self.private_ip.clone(),
            self.public_ip.clone(),
        ]
    }
}

/// Ordered collection of instances handed to renderers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Printable(Vec<Instance>);

impl Printable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column names, excluding internal-only fields
    pub fn headers(&self) -> Vec<String> {
        INSTANCE_FIELDS.iter().map(|f| f.to_string()).collect()
    }

    /// One row of column values per instance
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.0.iter().map(Instance::row).collect()
    }

    /// Flatten every instance into a JSON object, `raw` included
    pub fn flatten_data(&self) -> Result<FlattenData, serde_json::Error> {
        let mut rows = Vec::with_capacity(self.0.len());
        for instance in &self.0 {
            match serde_json::to_value(instance)? {
                Value::Object(map) => rows.push(map),
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    rows.push(map);
                }
            }
        }
        Ok(FlattenData::from(rows))
    }

    pub fn push(&mut self, instance: Instance) {
        self.0.push(instance);
    }

    pub fn extend(&mut self, other: Printable) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Instance> {
        self.0
    }
}

impl From<Vec<Instance>> for Printable {
    fn from(instances: Vec<Instance>) -> Self {
        Self(instances)
    }
}

impl FromIterator<Instance> for Printable {
    fn from_iter<I: IntoIterator<Item = Instance>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Printable {
    type Item = Instance;
    type IntoIter = std::vec::IntoIter<Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
