//! Cache chain resolution
//!
//! Call-scoped cache, then shared cache, then lookup source. The outcome of a
//! lookup, including "no row" and failed queries, is written back to every
//! tier that missed. Nothing is written when the source cannot be reached.

use super::{CallCache, Cached, SharedCache};
use crate::lookup::{LookupSource, fetch_first};
use crate::param::Param;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info};

/// Resolution statistics
#[derive(Debug, Default)]
pub struct ChainStats {
    /// Resolved from the call-scoped cache
    pub call_hits: AtomicU64,
    /// Resolved from the shared cache with a value
    pub shared_hits: AtomicU64,
    /// Resolved from the shared cache with a negative entry
    pub negative_hits: AtomicU64,
    /// Queries sent to the lookup source
    pub lookups: AtomicU64,
    /// Lookups that found nothing
    pub misses: AtomicU64,
    /// Lookups that failed
    pub failures: AtomicU64,
}

impl ChainStats {
    /// Fraction of resolutions answered by a cache tier (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.call_hits.load(Ordering::Relaxed)
            + self.shared_hits.load(Ordering::Relaxed)
            + self.negative_hits.load(Ordering::Relaxed);
        let total = hits + self.lookups.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.call_hits.store(0, Ordering::Relaxed);
        self.shared_hits.store(0, Ordering::Relaxed);
        self.negative_hits.store(0, Ordering::Relaxed);
        self.lookups.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }
}

/// Shared cache and lookup source, consulted after the call-scoped cache
pub struct CacheChain {
    shared: Option<Arc<dyn SharedCache>>,
    source: Arc<dyn LookupSource>,
    stats: ChainStats,
}

impl CacheChain {
    pub fn new(shared: Option<Arc<dyn SharedCache>>, source: Arc<dyn LookupSource>) -> Self {
        Self {
            shared,
            source,
            stats: ChainStats::default(),
        }
    }

    #[must_use]
    pub fn shared(&self) -> Option<&Arc<dyn SharedCache>> {
        self.shared.as_ref()
    }

    #[must_use]
    pub const fn stats(&self) -> &ChainStats {
        &self.stats
    }

    /// Display value for `key`, or `None` when there is nothing to write.
    ///
    /// `params` are bound to `sql` in order if the lookup source has to be
    /// consulted.
    pub fn resolve(
        &self,
        key: &str,
        sql: &str,
        params: &[Param],
        mut scope: Option<&mut CallCache>,
    ) -> Option<String> {
        if let Some(hit) = scope.as_deref().and_then(|s| s.get(key)) {
            self.stats.call_hits.fetch_add(1, Ordering::Relaxed);
            return hit.clone().into_value();
        }

        if let Some(shared) = &self.shared {
            if let Some(cached) = shared.get(key) {
                let counter = match cached {
                    Cached::Value(_) => &self.stats.shared_hits,
                    Cached::Missing => &self.stats.negative_hits,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                if let Some(scope) = scope.as_deref_mut() {
                    scope.put(key, cached.clone());
                }
                return cached.into_value();
            }
        }

        self.stats.lookups.fetch_add(1, Ordering::Relaxed);
        let source = self.source.name();
        let value = match fetch_first(self.source.as_ref(), sql, params) {
            Ok(Some(value)) => {
                debug!(key, source, "Lookup resolved");
                Some(value)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                info!(key, source, "Lookup found no value, caching negative entry");
                None
            }
            Err(e) if e.is_retryable() => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                error!(key, source, error = %e, "Lookup source unavailable, nothing cached");
                return None;
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                error!(key, source, sql, error = %e, "Lookup failed, caching negative entry");
                None
            }
        };

        let outcome = Cached::from(value.clone());
        if let Some(shared) = &self.shared {
            shared.put(key, outcome.clone());
        }
        if let Some(scope) = scope {
            scope.put(key, outcome);
        }
        value
    }
}
