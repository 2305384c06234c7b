use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Keyed result cache with a fixed time-to-live. A TTL of zero or less
/// disables caching entirely.
pub struct TtlCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl_secs: i64,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_secs,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_secs > 0
    }

    /// Fresh entry for `key`; a stale one is evicted on the way out.
    pub fn get(&self, key: &str) -> Option<T> {
        if !self.is_enabled() {
            return None;
        }
        if let Some(entry) = self.entries.get(key) {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            if age < self.ttl_secs {
                return Some(entry.data.clone());
            }
        }
        self.entries
            .remove_if(key, |_, entry| (Utc::now() - entry.cached_at).num_seconds() >= self.ttl_secs);
        None
    }

    /// Store `data` under `key`, sweeping out expired entries first.
    pub fn insert(&self, key: String, data: T) {
        if !self.is_enabled() {
            return;
        }
        self.purge_expired();
        self.entries.insert(
            key,
            CacheEntry {
                data,
                cached_at: Utc::now(),
            },
        );
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.entries
            .retain(|_, entry| (now - entry.cached_at).num_seconds() < self.ttl_secs);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn backdate(&self, key: &str, secs: i64) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.cached_at = entry.cached_at - chrono::Duration::seconds(secs);
        }
    }
}
