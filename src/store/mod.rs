//! Persistent per-tab state behind the [`Storage`] trait.
//!
//! Values are JSON and keyed by purpose and tab, e.g. `thresholds_3`. The
//! monitor writes snapshots through a [`WriteBatcher`]; thresholds and tab
//! settings are written directly so they are durable before they take effect.

pub mod batch;
pub mod file;
pub mod memory;
pub mod settings;

pub use batch::{WriteBatcher, DEFAULT_BATCH_WINDOW};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use settings::TabSettings;

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// Identifies one monitored page.
pub type TabId = u32;

/// Storage key for each per-tab purpose.
pub mod keys {
    use super::TabId;

    pub fn latest_data(tab: TabId) -> String {
        format!("latest_data_{tab}")
    }

    pub fn thresholds(tab: TabId) -> String {
        format!("thresholds_{tab}")
    }

    pub fn threshold_breach(tab: TabId) -> String {
        format!("threshold_breach_{tab}")
    }

    pub fn monitor_enabled(tab: TabId) -> String {
        format!("monitor_enabled_{tab}")
    }

    pub fn data_order(tab: TabId) -> String {
        format!("data_order_{tab}")
    }

    pub fn hidden_items(tab: TabId) -> String {
        format!("hidden_items_{tab}")
    }

    /// Every key a tab may own.
    pub fn all(tab: TabId) -> Vec<String> {
        vec![
            latest_data(tab),
            thresholds(tab),
            threshold_breach(tab),
            monitor_enabled(tab),
            data_order(tab),
            hidden_items(tab),
        ]
    }
}

/// Asynchronous key-value storage of JSON values.
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Values for the keys that exist. Missing keys are simply absent.
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError>;

    /// Write all entries.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError>;

    /// Remove the keys. Removing a missing key is not an error.
    async fn remove(&self, keys: &[String]) -> Result<(), StoreError>;
}

/// Read and decode one key.
pub async fn load<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>, StoreError> {
    let mut values = storage.get(&[key.to_string()]).await?;
    match values.remove(key) {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode and write one key.
pub async fn save<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> Result<(), StoreError> {
    let entries = HashMap::from([(key.to_string(), serde_json::to_value(value)?)]);
    storage.set(entries).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_scoped_by_tab() {
        assert_eq!(keys::latest_data(7), "latest_data_7");
        assert_eq!(keys::thresholds(7), "thresholds_7");
        assert_eq!(keys::monitor_enabled(7), "monitor_enabled_7");
        assert_eq!(keys::all(7).len(), 6);
        assert!(keys::all(7).iter().all(|k| k.ends_with("_7")));
    }

    #[tokio::test]
    async fn test_load_and_save_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(load::<Vec<String>>(&store, "order").await.unwrap(), None);

        save(&store, "order", &vec!["RSI".to_string()]).await.unwrap();
        let order: Option<Vec<String>> = load(&store, "order").await.unwrap();
        assert_eq!(order, Some(vec!["RSI".to_string()]));
    }
}
