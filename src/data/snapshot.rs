use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::DataValue;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One extraction: every accepted key with its value, and when it was read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(rename = "data")]
    pub values: BTreeMap<String, DataValue>,
    pub timestamp: u64,
}

impl DataSnapshot {
    pub fn new(timestamp: u64) -> Self {
        Self {
            values: BTreeMap::new(),
            timestamp,
        }
    }

    /// Insert a value. A repeated key replaces the earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: DataValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into this snapshot; values from `other` win.
    pub fn merge(&mut self, other: DataSnapshot) {
        self.values.extend(other.values);
    }
}

impl<K: Into<String>> FromIterator<(K, DataValue)> for DataSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, DataValue)>>(iter: I) -> Self {
        let mut snapshot = DataSnapshot::new(now_millis());
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_later_wins() {
        let mut first: DataSnapshot = [("A", DataValue::Number(1.0)), ("B", DataValue::Number(2.0))]
            .into_iter()
            .collect();
        let second: DataSnapshot = [("B", DataValue::Number(3.0))].into_iter().collect();

        first.merge(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.get("B"), Some(&DataValue::Number(3.0)));
    }

    #[test]
    fn test_serializes_as_stored_record() {
        let mut snapshot = DataSnapshot::new(42);
        snapshot.insert("RSI", DataValue::Number(55.0));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json, serde_json::json!({"data": {"RSI": 55.0}, "timestamp": 42}));
    }
}
