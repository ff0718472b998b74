//! Per-tab panel settings: monitoring enabled, row order, hidden rows.

use std::collections::BTreeSet;

use super::{keys, load, save, Storage, TabId};
use crate::error::StoreError;

/// Panel settings of one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSettings {
    tab: TabId,
    pub enabled: bool,
    /// Keys in the order the user arranged them.
    pub order: Vec<String>,
    pub hidden: BTreeSet<String>,
}

impl TabSettings {
    /// Defaults for a tab nothing was saved for: enabled, no order, nothing hidden.
    pub fn new(tab: TabId) -> Self {
        Self {
            tab,
            enabled: true,
            order: Vec::new(),
            hidden: BTreeSet::new(),
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub async fn load(storage: &dyn Storage, tab: TabId) -> Result<Self, StoreError> {
        Ok(Self {
            tab,
            enabled: load(storage, &keys::monitor_enabled(tab)).await?.unwrap_or(true),
            order: load(storage, &keys::data_order(tab)).await?.unwrap_or_default(),
            hidden: load(storage, &keys::hidden_items(tab)).await?.unwrap_or_default(),
        })
    }

    pub async fn set_enabled(&mut self, storage: &dyn Storage, enabled: bool) -> Result<(), StoreError> {
        save(storage, &keys::monitor_enabled(self.tab), &enabled).await?;
        self.enabled = enabled;
        Ok(())
    }

    pub async fn set_order(&mut self, storage: &dyn Storage, order: Vec<String>) -> Result<(), StoreError> {
        save(storage, &keys::data_order(self.tab), &order).await?;
        self.order = order;
        Ok(())
    }

    /// Hide or unhide a key.
    pub async fn set_hidden(&mut self, storage: &dyn Storage, key: &str, hidden: bool) -> Result<(), StoreError> {
        let mut updated = self.hidden.clone();
        if hidden {
            updated.insert(key.to_string());
        } else {
            updated.remove(key);
        }
        save(storage, &keys::hidden_items(self.tab), &updated).await?;
        self.hidden = updated;
        Ok(())
    }

    /// Move `key` one place up (`-1`) or down (`1`) among `visible`, and
    /// persist the resulting order.
    pub async fn move_key(
        &mut self,
        storage: &dyn Storage,
        visible: &[String],
        key: &str,
        offset: isize,
    ) -> Result<(), StoreError> {
        let mut order = visible.to_vec();
        let Some(from) = order.iter().position(|k| k == key) else {
            return Ok(());
        };
        let to = from as isize + offset;
        if to < 0 || to as usize >= order.len() {
            return Ok(());
        }
        order.swap(from, to as usize);
        self.set_order(storage, order).await
    }

    /// Keys in display order: saved order first, then the rest in key order.
    /// Hidden keys are left out.
    pub fn arrange<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let present: BTreeSet<&str> = keys.into_iter().collect();
        let ordered = self.order.iter().map(String::as_str).filter(|k| present.contains(k));
        let rest = present
            .iter()
            .copied()
            .filter(|k| !self.order.iter().any(|o| o == k));

        ordered
            .chain(rest)
            .filter(|k| !self.hidden.contains(*k))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_arrange_saved_order_then_rest() {
        let mut settings = TabSettings::new(1);
        settings.order = vec!["Volume".to_string(), "Gone".to_string(), "RSI".to_string()];
        settings.hidden.insert("EMA".to_string());

        let arranged = settings.arrange(["RSI", "EMA", "MACD", "Volume", "ATR"]);
        assert_eq!(arranged, vec!["Volume", "RSI", "ATR", "MACD"]);
    }

    #[tokio::test]
    async fn test_settings_persist_per_tab() {
        let store = MemoryStore::new();
        let mut settings = TabSettings::load(&store, 4).await.unwrap();
        assert!(settings.enabled);

        settings.set_enabled(&store, false).await.unwrap();
        settings.set_hidden(&store, "RSI", true).await.unwrap();

        let reloaded = TabSettings::load(&store, 4).await.unwrap();
        assert!(!reloaded.enabled);
        assert!(reloaded.hidden.contains("RSI"));

        let other = TabSettings::load(&store, 5).await.unwrap();
        assert!(other.enabled);
    }

    #[tokio::test]
    async fn test_move_key_persists_visible_order() {
        let store = MemoryStore::new();
        let mut settings = TabSettings::new(1);
        let visible = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        settings.move_key(&store, &visible, "C", -1).await.unwrap();
        assert_eq!(settings.order, vec!["A", "C", "B"]);

        settings.move_key(&store, &visible, "A", -1).await.unwrap();
        assert_eq!(settings.order, vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_value() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let mut settings = TabSettings::new(1);

        assert!(settings.set_enabled(&store, false).await.is_err());
        assert!(settings.enabled);
    }
}
