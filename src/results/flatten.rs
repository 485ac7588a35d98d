//! Renderer-facing flattened representation

use serde::Serialize;
use serde_json::{Map, Value};

/// Ordered list of field maps, one per instance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlattenData(Vec<Map<String, Value>>);

impl FlattenData {
    /// Project every row onto `keys`.
    ///
    /// Row order and count never change; a key missing from a row becomes
    /// `null` in that row.
    pub fn filter<S: AsRef<str>>(&self, keys: &[S]) -> Vec<Map<String, Value>> {
        self.0
            .iter()
            .map(|row| {
                keys.iter()
                    .map(|key| {
                        let key = key.as_ref();
                        (key.to_string(), row.get(key).cloned().unwrap_or(Value::Null))
                    })
                    .collect()
            })
            .collect()
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Map<String, Value>>> for FlattenData {
    fn from(rows: Vec<Map<String, Value>>) -> Self {
        Self(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> FlattenData {
        let rows = vec![
            json!({"id": "a", "name": "web-1", "status": "up"}),
            json!({"id": "b", "name": "web-2"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect::<Vec<_>>();
        FlattenData::from(rows)
    }

    #[test]
    fn test_filter_projects_requested_keys() {
        let filtered = data().filter(&["name"]);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].len(), 1);
        assert_eq!(filtered[1]["name"], json!("web-2"));
    }

    #[test]
    fn test_filter_keeps_rows_with_absent_fields() {
        let filtered = data().filter(&["id", "status"]);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0]["status"], json!("up"));
        assert_eq!(filtered[1]["status"], Value::Null);
        assert_eq!(filtered[1]["id"], json!("b"));
    }

    #[test]
    fn test_filter_unknown_key_is_null_everywhere() {
        let filtered = data().filter(&["zone".to_string()]);
        assert!(filtered.iter().all(|row| row["zone"].is_null()));
    }
}
