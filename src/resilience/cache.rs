//! Short-lived response cache for expensive external lookups.
//!
//! Entries are fresh while `now - timestamp < ttl`. Stale entries are not
//! evicted when read; they stay until the next prune. Pruning runs on
//! `set` once the cache holds more than `max_entries`: expired entries go
//! first, then the oldest remaining ones until the cache is back at capacity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::clock::{elapsed_since, Clock};

/// Cache limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Seconds an entry stays fresh
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Entries kept before pruning
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl() -> u64 {
    300
}
fn default_max_entries() -> usize {
    500
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// A cached value and when it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: DateTime<Utc>,

    /// Insertion order, breaks timestamp ties during eviction
    seq: u64,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

/// TTL cache with oldest-first eviction above a size cap
pub struct ResponseCache<V> {
    name: String,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(name: impl Into<String>, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            settings,
            clock,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_seq: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Fresh value for `key`, or `None` on a miss
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let ttl = self.settings.ttl();
        let mut inner = self.lock();

        let fresh = inner
            .entries
            .get(key)
            .filter(|entry| elapsed_since(now, entry.timestamp) < ttl)
            .map(|entry| entry.value.clone());

        match fresh {
            Some(value) => {
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store `value` under `key`, pruning if over capacity
    pub fn set(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        let mut inner = self.lock();

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.into(),
            CacheEntry {
                value,
                timestamp: now,
                seq,
            },
        );

        if inner.entries.len() > self.settings.max_entries {
            self.prune_locked(&mut inner, now);
        }
    }

    /// Run eviction now, regardless of size
    pub fn prune(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        self.prune_locked(&mut inner, now);
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }

    fn prune_locked(&self, inner: &mut CacheInner<V>, now: DateTime<Utc>) {
        let ttl = self.settings.ttl();
        let before = inner.entries.len();

        // Phase 1: drop everything past its TTL
        inner
            .entries
            .retain(|_, entry| elapsed_since(now, entry.timestamp) < ttl);

        // Phase 2: drop the oldest until back at capacity
        let excess = inner.entries.len().saturating_sub(self.settings.max_entries);
        if excess > 0 {
            let mut by_age: Vec<(DateTime<Utc>, u64, String)> = inner
                .entries
                .iter()
                .map(|(key, entry)| (entry.timestamp, entry.seq, key.clone()))
                .collect();
            by_age.sort();

            for (_, _, key) in by_age.into_iter().take(excess) {
                inner.entries.remove(&key);
            }
        }

        debug!(
            cache = %self.name,
            evicted = before - inner.entries.len(),
            remaining = inner.entries.len(),
            "Pruned cache"
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner<V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build a canonical cache key from an operation, locale and query parts.
///
/// Parts are trimmed and lowercased; long keys are hashed so the key size
/// stays bounded for large keyword batches.
pub fn cache_key(operation: &str, locale: &str, parts: &[&str]) -> String {
    let normalized: Vec<String> = parts.iter().map(|p| p.trim().to_lowercase()).collect();
    let query = normalized.join("\u{1f}");

    if query.len() <= 128 {
        return format!("{}|{}|{}", operation, locale.to_lowercase(), query);
    }

    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    format!(
        "{}|{}|sha256:{}",
        operation,
        locale.to_lowercase(),
        hex::encode(hasher.finalize())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;
    use chrono::TimeZone;

    fn cache(ttl_secs: u64, max_entries: usize) -> (ResponseCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let cache = ResponseCache::new(
            "test",
            CacheSettings {
                ttl_secs,
                max_entries,
            },
            clock.clone(),
        );
        (cache, clock)
    }

    #[test]
    fn test_set_then_get_hits() {
        let (cache, _clock) = cache(60, 10);
        cache.set("k", 7);

        assert_eq!(cache.get("k"), Some(7));
        assert_eq!(cache.get("missing"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_entry_is_miss_but_not_evicted() {
        let (cache, clock) = cache(60, 10);
        cache.set("k", 7);

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 1);

        cache.prune();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_prefers_expired_entries() {
        let (cache, clock) = cache(60, 2);
        cache.set("old", 1);
        clock.advance(Duration::from_secs(30));
        cache.set("mid", 2);
        clock.advance(Duration::from_secs(31));

        // "old" is now expired, "mid" is still fresh
        cache.set("new", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("mid"), Some(2));
        assert_eq!(cache.get("new"), Some(3));
    }

    #[test]
    fn test_eviction_falls_back_to_oldest() {
        let (cache, _clock) = cache(60, 2);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_clear() {
        let (cache, _clock) = cache(60, 10);
        cache.set("a", 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_is_canonical() {
        assert_eq!(
            cache_key("serp", "en-US", &["  Running Shoes "]),
            cache_key("serp", "en-us", &["running shoes"])
        );
        assert_ne!(
            cache_key("serp", "en-US", &["shoes"]),
            cache_key("serp", "de-DE", &["shoes"])
        );

        let many: Vec<String> = (0..100).map(|i| format!("keyword {}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let key = cache_key("keyword_data", "en-US", &refs);
        assert!(key.starts_with("keyword_data|en-us|sha256:"));
    }
}
