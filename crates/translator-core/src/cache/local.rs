//! Process-local shared cache
//!
//! Bounded by entry count and expiring entries a fixed time after they were
//! written. Eviction and expiry are handled by `moka`.

use super::{Cached, Locality, SharedCache};
use moka::sync::Cache;
use std::time::Duration;
use translator_common::CacheConfig;
use translator_common::config::MAX_EXPIRE_MINUTES;

const MAX_TTL: Duration = Duration::from_secs(MAX_EXPIRE_MINUTES * 60);

/// In-process shared cache
pub struct LocalCache {
    entries: Cache<String, Cached>,
}

impl LocalCache {
    /// Create a cache holding at most `max_capacity` entries for `ttl` each.
    /// Longer TTLs are capped at 100 years.
    #[must_use]
    pub fn new(initial_capacity: usize, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .initial_capacity(initial_capacity)
                .max_capacity(max_capacity)
                .time_to_live(ttl.min(MAX_TTL))
                .build(),
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.initial_capacity, config.max_capacity, config.ttl())
    }

    /// Approximate number of live entries
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl SharedCache for LocalCache {
    fn name(&self) -> &str {
        "local"
    }

    fn get(&self, key: &str) -> Option<Cached> {
        self.entries.get(key)
    }

    fn put(&self, key: &str, value: Cached) {
        self.entries.insert(key.to_string(), value);
    }

    fn locality(&self) -> Locality {
        Locality::Local
    }
}
