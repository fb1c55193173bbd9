//! Builder for configuring [`ResponseCache`].

use std::sync::Arc;

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use ravel_core::CacheKey;
use tracing::debug;

use crate::cache::{DEFAULT_MAX_ENTRIES, ResponseCache};
use crate::item::CachedItem;

#[derive(Debug, Clone, Copy)]
enum Capacity {
    Entries(u64),
    Bytes(u64),
}

/// Builder for creating a [`ResponseCache`].
///
/// Use [`ResponseCache::builder`] to create a new builder instance. Without
/// further configuration the cache holds [`DEFAULT_MAX_ENTRIES`] entries.
///
/// # Capacity
///
/// - [`max_entries(n)`](Self::max_entries) - limit by entry count
/// - [`max_bytes(n)`](Self::max_bytes) - limit by approximate memory usage
///
/// The last call wins. Eviction is always least-recently-used.
///
/// # Examples
///
/// ```
/// use ravel_cache::ResponseCache;
///
/// let cache = ResponseCache::builder()
///     .max_bytes(16 * 1024 * 1024)
///     .build();
/// assert_eq!(cache.entry_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ResponseCacheBuilder {
    capacity: Capacity,
}

impl ResponseCacheBuilder {
    /// Creates a builder bounded to [`DEFAULT_MAX_ENTRIES`] entries.
    pub fn new() -> Self {
        Self {
            capacity: Capacity::Entries(DEFAULT_MAX_ENTRIES),
        }
    }

    /// Sets the maximum number of entries the cache can hold.
    pub fn max_entries(mut self, entries: u64) -> Self {
        self.capacity = Capacity::Entries(entries);
        self
    }

    /// Sets the approximate memory budget in bytes.
    ///
    /// Each entry weighs its change vector plus payload plus a fixed overhead.
    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.capacity = Capacity::Bytes(bytes);
        self
    }

    /// Builds the cache.
    pub fn build(self) -> ResponseCache {
        let builder = Cache::builder()
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(log_eviction);

        match self.capacity {
            Capacity::Entries(entries) => {
                let items = builder.max_capacity(entries).build();
                ResponseCache::from_parts(items, entries)
            }
            Capacity::Bytes(bytes) => {
                let items = builder
                    .max_capacity(bytes)
                    .weigher(|key: &CacheKey, item: &Arc<CachedItem>| {
                        let weight = key.memory_size() + item.memory_size();
                        u32::try_from(weight).unwrap_or(u32::MAX)
                    })
                    .build();
                ResponseCache::from_parts(items, u64::MAX)
            }
        }
    }
}

impl Default for ResponseCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn log_eviction(key: Arc<CacheKey>, _item: Arc<CachedItem>, cause: RemovalCause) {
    if cause.was_evicted() {
        debug!(key = %key, ?cause, "cache entry evicted");
    }
}
