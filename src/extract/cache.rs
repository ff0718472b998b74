//! Short-lived cache of located elements.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::Strategy;
use crate::page::{ElementRef, Page};

/// Default lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3);

/// What a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The hover target found by the locator.
    TargetElement,
    /// The currently visible tooltip tables.
    VisibleTables,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::TargetElement => "target-element",
            CacheKey::VisibleTables => "visible-tables",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub elements: Vec<ElementRef>,
    /// Locator strategy that produced the entry, for target entries.
    pub strategy: Option<Strategy>,
    pub stored_at: Instant,
}

/// Element cache with a fixed time-to-live.
///
/// An entry is served only while it is younger than the TTL and every element
/// in it is still attached to the page. Invalid entries are dropped on read.
#[derive(Debug)]
pub struct ElementCache {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl Default for ElementCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ElementCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: CacheKey, page: &dyn Page) -> Option<&CacheEntry> {
        let valid = self.entries.get(&key).is_some_and(|entry| {
            entry.stored_at.elapsed() < self.ttl
                && entry.elements.iter().all(|e| page.is_attached(*e))
        });
        if !valid {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key)
    }

    pub fn insert(&mut self, key: CacheKey, elements: Vec<ElementRef>, strategy: Option<Strategy>) {
        self.entries.insert(
            key,
            CacheEntry {
                elements,
                strategy,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&mut self, key: CacheKey) {
        self.entries.remove(&key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
