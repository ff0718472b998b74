//! Debounced storage writes.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use super::Storage;
use crate::error::StoreError;

/// Default debounce window.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(500);

/// Collects writes and hands them to storage as one batch.
///
/// Every push moves the deadline to `window` after the push, so a burst of
/// writes is flushed once, after it ends. Only the last value per key is kept.
/// The owner polls [`deadline`](Self::deadline) and calls
/// [`flush`](Self::flush) when it passes.
#[derive(Debug)]
pub struct WriteBatcher {
    window: Duration,
    pending: HashMap<String, Value>,
    deadline: Option<Instant>,
}

impl Default for WriteBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_WINDOW)
    }
}

impl WriteBatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            deadline: None,
        }
    }

    /// Queue a write, replacing any pending value for the key.
    pub fn push(&mut self, key: String, value: Value) {
        self.pending.insert(key, value);
        self.deadline = Some(Instant::now() + self.window);
    }

    /// When the pending batch is due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drop pending writes without writing them.
    pub fn discard(&mut self) {
        self.pending.clear();
        self.deadline = None;
    }

    /// Write all pending entries. Returns how many were written. A failed
    /// batch is dropped; later snapshots supersede it.
    pub async fn flush(&mut self, storage: &dyn Storage) -> Result<usize, StoreError> {
        self.deadline = None;
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(&mut self.pending);
        let count = batch.len();
        storage.set(batch).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_push_debounces_deadline() {
        let mut batcher = WriteBatcher::new(Duration::from_millis(500));
        assert!(batcher.deadline().is_none());

        batcher.push("a".to_string(), json!(1));
        let first = batcher.deadline().unwrap();

        tokio::time::advance(Duration::from_millis(300)).await;
        batcher.push("a".to_string(), json!(2));
        let second = batcher.deadline().unwrap();

        assert_eq!(second - first, Duration::from_millis(300));
        assert_eq!(batcher.pending(), 1);
    }

    #[tokio::test]
    async fn test_flush_writes_last_value_per_key() {
        let store = MemoryStore::new();
        let mut batcher = WriteBatcher::default();
        batcher.push("a".to_string(), json!(1));
        batcher.push("b".to_string(), json!(2));
        batcher.push("a".to_string(), json!(3));

        assert_eq!(batcher.flush(&store).await.unwrap(), 2);
        assert!(batcher.is_empty());
        assert!(batcher.deadline().is_none());
        assert_eq!(store.peek("a"), Some(json!(3)));

        assert_eq!(batcher.flush(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_drops_batch() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let mut batcher = WriteBatcher::default();
        batcher.push("a".to_string(), json!(1));

        assert!(batcher.flush(&store).await.is_err());
        assert!(batcher.is_empty());
    }
}
