//! The per-session parameter accumulator.

use serde_json::{Map, Value};

/// A name to value mapping that collects search parameters across the tool
/// calls of one session.
///
/// Values are only ever added or overwritten, never removed. Each session
/// owns a fresh accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterAccumulator {
    values: Map<String, Value>,
}

impl ParameterAccumulator {
    /// Creates an empty accumulator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `partial` into the accumulator. Incoming keys overwrite
    /// existing ones, other keys are kept.
    pub fn merge(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.values.insert(key, value);
        }
    }

    /// Returns a copy of the current values.
    #[inline]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// Returns the value of `key`.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the number of collected parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing has been collected yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_merge_keeps_both_sides() {
        let mut params = ParameterAccumulator::new();
        params.merge(object(json!({ "latitude": 10 })));
        params.merge(object(json!({ "longitude": 20 })));
        assert_eq!(params.get("latitude"), Some(&json!(10)));
        assert_eq!(params.get("longitude"), Some(&json!(20)));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut params = ParameterAccumulator::new();
        params.merge(object(json!({ "query": "spa", "rating": 4 })));
        params.merge(object(json!({ "query": "pool" })));
        assert_eq!(
            Value::Object(params.snapshot()),
            json!({ "query": "pool", "rating": 4 })
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut params = ParameterAccumulator::new();
        let snapshot = params.snapshot();
        params.merge(object(json!({ "city": "Lyon" })));
        assert!(snapshot.is_empty());
        assert!(!params.is_empty());
    }
}
