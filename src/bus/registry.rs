use std::collections::HashMap;
use std::hash::Hash;

/// Tracks which owner holds which resource, e.g. tab → panel.
#[derive(Debug, Clone)]
pub struct OwnershipRegistry<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for OwnershipRegistry<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: PartialEq> OwnershipRegistry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Record ownership, returning the previous value.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    /// The owner of `value`, if any.
    pub fn find_by_value(&self, value: &V) -> Option<K> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(k, _)| k.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
