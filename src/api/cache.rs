use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Serialized rollup responses keyed by source and request parameters.
///
/// Every rollup is rebuilt from the sheet on a miss; this TTL is the only
/// staleness bound.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

struct CacheEntry {
    body: String,
    inserted_at: Instant,
}

impl ResponseCache {
    /// A TTL of 0 disables caching (all lookups miss).
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a cached body. Returns `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<String> {
        if self.ttl.is_zero() {
            return None;
        }
        self.entries.lock().get(key).and_then(|entry| {
            (entry.inserted_at.elapsed() <= self.ttl).then(|| entry.body.clone())
        })
    }

    pub fn insert(&self, key: String, body: String) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.lock().insert(
            key,
            CacheEntry {
                body,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
