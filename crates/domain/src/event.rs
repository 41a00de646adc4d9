//! Event occurrences.

use serde_json::Value;

use crate::time::{self, Timestamp};

/// One occurrence of a named event, with its optional payload.
#[derive(Debug, Clone)]
pub struct EventRecord {
    name: String,
    data: Option<Value>,
    timestamp: Timestamp,
}

impl EventRecord {
    /// Record an occurrence happening now.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            name: name.into(),
            data,
            timestamp: time::now(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Wire representation, a single-key object:
    /// `{"overheated": {"data": 102, "timestamp": ...}}`.
    #[must_use]
    pub fn as_description(&self) -> Value {
        let mut inner = serde_json::Map::new();
        if let Some(data) = &self.data {
            inner.insert("data".into(), data.clone());
        }
        inner.insert(
            "timestamp".into(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        let mut outer = serde_json::Map::new();
        outer.insert(self.name.clone(), Value::Object(inner));
        Value::Object(outer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_describe_occurrence_as_single_key_object() {
        let record = EventRecord::new("overheated", Some(json!(102)));
        let description = record.as_description();
        assert_eq!(description["overheated"]["data"], json!(102));
        assert!(description["overheated"]["timestamp"].is_string());
    }

    #[test]
    fn should_omit_data_from_description_when_absent() {
        let record = EventRecord::new("motion", None);
        let description = record.as_description();
        assert!(description["motion"].get("data").is_none());
        assert!(description["motion"]["timestamp"].is_string());
    }
}
