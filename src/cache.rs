//! Response cache for read-heavy catalog endpoints.
//!
//! Entries are JSON payloads keyed by strings such as `groups:tree` or
//! `categories:flat`. Lookups past the TTL count as misses and drop the entry; the LRU
//! bound caps memory. Writers invalidate with glob patterns (`groups:*`).

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use globset::Glob;
use lru::LruCache;
use serde_json::Value;

use crate::config::CacheConfig;

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

#[derive(Clone)]
pub struct ResponseCache {
    entries: Option<Arc<Mutex<LruCache<String, CacheEntry>>>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let entries =
            NonZeroUsize::new(max_entries).map(|cap| Arc::new(Mutex::new(LruCache::new(cap))));
        Self { entries, ttl }
    }

    /// A cache that stores nothing; every lookup misses.
    pub fn disabled() -> Self {
        Self { entries: None, ttl: Duration::ZERO }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        if cfg.enabled {
            Self::new(cfg.max_entries, Duration::from_secs(cfg.ttl_secs))
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.as_ref()?;
        let mut cache = entries.lock().ok()?;
        let expired = match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        if let Some(entries) = &self.entries {
            if let Ok(mut cache) = entries.lock() {
                cache.put(key.into(), CacheEntry { value, inserted_at: Instant::now() });
            }
        }
    }

    /// Removes every key matching the glob `pattern` and returns how many were dropped.
    pub fn clear(&self, pattern: &str) -> Result<usize, globset::Error> {
        let matcher = Glob::new(pattern)?.compile_matcher();
        let Some(entries) = &self.entries else {
            return Ok(0);
        };
        let Ok(mut cache) = entries.lock() else {
            return Ok(0);
        };
        let doomed: Vec<String> = cache
            .iter()
            .map(|(k, _)| k)
            .filter(|k| matcher.is_match(k.as_str()))
            .cloned()
            .collect();
        for key in &doomed {
            cache.pop(key);
        }
        Ok(doomed.len())
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().and_then(|e| e.lock().ok().map(|c| c.len())).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
