//! Local Tier (L1)
//!
//! Bounded in-process store with a single global time-to-live.
//!
//! Every operation takes one mutex; `list_keys` copies a snapshot under the
//! lock so callers can iterate without holding it. Expired entries are
//! dropped lazily: on the access that observes them or under capacity
//! pressure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;

use super::CacheBackend;
use crate::config::L1Settings;
use crate::error::CacheError;

struct Entry {
    value: Value,
    inserted_at: Instant,
}

impl Entry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

struct LocalInner {
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

/// Bounded per-entry-TTL map, the in-process cache tier.
///
/// The TTL is global and fixed at construction; an entry is logically absent
/// once it has lived that long, whether or not it has been physically
/// removed. The store never holds more than `maxsize` entries.
pub struct LocalStore {
    maxsize: usize,
    ttl: Duration,
    ttl_secs: u64,
    inner: Mutex<LocalInner>,
}

impl LocalStore {
    /// Create a store from validated L1 settings.
    pub fn new(settings: &L1Settings) -> Self {
        debug!(
            maxsize = settings.maxsize,
            ttl = settings.ttl,
            "Local store initialized"
        );
        Self {
            maxsize: settings.maxsize,
            ttl: Duration::from_secs(settings.ttl),
            ttl_secs: settings.ttl,
            inner: Mutex::new(LocalInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Inserts under capacity pressure: the oldest expired entry goes first;
    /// with none expired, the oldest entry by insertion time is dropped. The
    /// TTL is global, so the oldest entry is always the first to expire and
    /// one scan covers both rules.
    fn insert_locked(&self, inner: &mut LocalInner, key: String, value: Value) {
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.maxsize {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                debug!(key = %victim, "Local store evicting entry");
                inner.entries.remove(&victim);
            }
        }
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn live_entry_exists(&self, inner: &LocalInner, key: &str) -> bool {
        inner
            .entries
            .get(key)
            .map(|e| !e.is_expired(self.ttl))
            .unwrap_or(false)
    }

    /// Rewinds a stored entry's insertion instant, as if it were inserted
    /// `by` earlier.
    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &str, by: Duration) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.inserted_at -= by;
        }
    }
}

#[async_trait]
impl CacheBackend for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut inner = self.inner.lock();
        let lookup = inner.entries.get(key).map(|entry| {
            if entry.is_expired(self.ttl) {
                None
            } else {
                Some(entry.value.clone())
            }
        });
        match lookup {
            Some(Some(value)) => {
                inner.hits += 1;
                debug!(key = %key, "L1 cache hit");
                Ok(Some(value))
            }
            Some(None) => {
                // Expired on access: drop it and report a miss.
                inner.entries.remove(key);
                inner.misses += 1;
                debug!(key = %key, "L1 cache miss (expired)");
                Ok(None)
            }
            None => {
                inner.misses += 1;
                debug!(key = %key, "L1 cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, _ttl: Option<u64>) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, key.to_string(), value.clone());
        debug!(key = %key, "L1 cache set");
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &Value,
        _ttl: Option<u64>,
    ) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock();
        if self.live_entry_exists(&inner, key) {
            return Ok(false);
        }
        self.insert_locked(&mut inner, key.to_string(), value.clone());
        debug!(key = %key, "L1 cache set (absent)");
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let removed = self.inner.lock().entries.remove(key).is_some();
        if removed {
            debug!(key = %key, "L1 cache delete");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let mut inner = self.inner.lock();
        let live = inner
            .entries
            .values()
            .filter(|e| !e.is_expired(self.ttl))
            .count() as u64;
        inner.entries.clear();
        debug!(removed = live, "L1 cache cleared");
        Ok(live)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let inner = self.inner.lock();
        Ok(self.live_entry_exists(&inner, key))
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError> {
        let inner = self.inner.lock();
        if self.live_entry_exists(&inner, key) {
            // Per-entry countdowns are not tracked; report the global TTL.
            Ok(Some(self.ttl_secs))
        } else {
            Ok(None)
        }
    }

    async fn list_keys<'a>(&'a self, prefix: Option<&'a str>) -> Result<Vec<String>, CacheError> {
        let inner = self.inner.lock();
        let keys = inner
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(self.ttl))
            .map(|(k, _)| k.clone())
            .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
            .collect();
        Ok(keys)
    }

    async fn size(&self) -> Result<u64, CacheError> {
        let inner = self.inner.lock();
        let live = inner
            .entries
            .values()
            .filter(|e| !e.is_expired(self.ttl))
            .count() as u64;
        Ok(live)
    }

    async fn stats(&self) -> Value {
        let inner = self.inner.lock();
        let size = inner
            .entries
            .values()
            .filter(|e| !e.is_expired(self.ttl))
            .count() as u64;
        let total_requests = inner.hits + inner.misses;
        let hit_rate = if total_requests > 0 {
            inner.hits as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };
        json!({
            "backend": "local",
            "enabled": true,
            "size": size,
            "maxsize": self.maxsize,
            "ttl": self.ttl_secs,
            "hits": inner.hits,
            "misses": inner.misses,
            "total_requests": total_requests,
            "hit_rate": (hit_rate * 100.0).round() / 100.0,
            "usage_percent": ((size as f64 / self.maxsize as f64 * 100.0) * 100.0).round() / 100.0,
        })
    }

    async fn close(&self) {}
}
