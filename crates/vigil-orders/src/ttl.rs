//! Bounded time-to-live key set.
//!
//! Backs the dedup and finalized-context horizons. Entries expire after the
//! TTL; pruning happens lazily on insert to keep the map bounded without a
//! background task.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Prune the whole map once it grows past this many entries.
const PRUNE_THRESHOLD: usize = 4096;

/// A set of string keys that forget themselves after a TTL.
#[derive(Debug)]
pub struct TtlSet {
    ttl: Duration,
    entries: HashMap<String, Instant>,
}

impl TtlSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Record a key, stamping the current time.
    pub fn insert(&mut self, key: String) {
        if self.entries.len() >= PRUNE_THRESHOLD {
            self.prune();
        }
        self.entries.insert(key, Instant::now());
    }

    /// Whether the key is present and not expired. Expired entries are
    /// removed on sight.
    pub fn contains(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(stamp) if stamp.elapsed() < self.ttl => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, stamp| stamp.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let mut set = TtlSet::new(Duration::from_secs(60));
        set.insert("a".to_string());
        assert!(set.contains("a"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!set.contains("a"));
        assert!(set.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_refreshes_stamp() {
        let mut set = TtlSet::new(Duration::from_secs(60));
        set.insert("a".to_string());
        tokio::time::advance(Duration::from_secs(40)).await;
        set.insert("a".to_string());
        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(set.contains("a"));
    }
}
