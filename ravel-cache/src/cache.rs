//! The response cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use moka::sync::Cache;
use ravel_core::CacheKey;
use tracing::debug;

use crate::builder::ResponseCacheBuilder;
use crate::config::ResponseCacheConfig;
use crate::item::{CachedInfo, CachedItem, ItemFlags, ReleaseHandle};

/// Change vector stored in negative-cache markers.
///
/// No server ever issues this value, so a marker can never be confused with a
/// real version of the resource.
pub const NOT_FOUND_CHANGE_VECTOR: &str = "404 Response";

/// Default bound on the number of cached entries.
pub const DEFAULT_MAX_ENTRIES: u64 = 500;

/// State shared between the cache and the handles it gives out.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    generation: AtomicU64,
    disposed: AtomicBool,
}

impl Shared {
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Bounded map from [`CacheKey`] to the last known `(change vector, body)`.
///
/// One instance belongs to one HTTP client and is shared by reference between
/// all command invocations running against it. Every operation is safe to
/// call concurrently; the underlying Moka cache synchronizes internally.
///
/// # Eviction
///
/// Entries are evicted least-recently-used first, where both inserts and
/// lookups count as use. Writing an existing key replaces its entry.
///
/// # Failure semantics
///
/// The cache never surfaces errors. After [`dispose`](Self::dispose), every
/// lookup misses and every write is ignored.
#[derive(Clone)]
pub struct ResponseCache {
    items: Cache<CacheKey, Arc<CachedItem>>,
    shared: Arc<Shared>,
    max_entries: u64,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("max_entries", &self.max_entries)
            .field("entry_count", &self.items.entry_count())
            .field("generation", &self.generation())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ResponseCache {
    /// Creates a builder with the default bound of [`DEFAULT_MAX_ENTRIES`].
    pub fn builder() -> ResponseCacheBuilder {
        ResponseCacheBuilder::new()
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &ResponseCacheConfig) -> Self {
        Self::builder().max_entries(config.max_entries).build()
    }

    pub(crate) fn from_parts(items: Cache<CacheKey, Arc<CachedItem>>, max_entries: u64) -> Self {
        Self {
            items,
            shared: Arc::new(Shared::default()),
            max_entries,
        }
    }

    /// Stores the body fetched for `key` under its change vector.
    pub fn set(&self, key: &CacheKey, change_vector: &str, payload: &str) {
        if self.is_disposed() {
            return;
        }
        debug!(%key, change_vector, bytes = payload.len(), "cache set");
        let item = CachedItem::new(
            change_vector.to_owned(),
            Some(Arc::from(payload)),
            ItemFlags::NONE,
            self.generation(),
        );
        self.items.insert(key.clone(), Arc::new(item));
    }

    /// Stores a negative-cache marker: the resource is confirmed absent.
    pub fn set_not_found(&self, key: &CacheKey, aggressively_cached: bool) {
        if self.is_disposed() {
            return;
        }
        debug!(%key, aggressively_cached, "cache set not found");
        let flags = ItemFlags {
            not_found: true,
            aggressively_cached,
        };
        let item = CachedItem::new(
            NOT_FOUND_CHANGE_VECTOR.to_owned(),
            None,
            flags,
            self.generation(),
        );
        self.items.insert(key.clone(), Arc::new(item));
    }

    /// Looks `key` up. A miss yields an empty handle, never an error.
    pub fn get(&self, key: &CacheKey) -> ReleaseHandle {
        let item = if self.is_disposed() {
            None
        } else {
            self.items.get(key)
        };
        ReleaseHandle::new(item, self.shared.clone())
    }

    /// Looks `key` up and reports what was found to `on_found`.
    ///
    /// The callback always runs: with the entry's change vector and payload,
    /// or with `{None, None}` on a miss.
    pub fn get_with<F>(&self, key: &CacheKey, on_found: F) -> ReleaseHandle
    where
        F: FnOnce(CachedInfo),
    {
        let handle = self.get(key);
        on_found(handle.info());
        handle
    }

    /// Removes the entry for `key`, if any.
    pub fn invalidate(&self, key: &CacheKey) {
        self.items.invalidate(key);
    }

    /// Removes every entry. The cache stays usable.
    pub fn clear(&self) {
        self.items.invalidate_all();
        self.items.run_pending_tasks();
    }

    /// Removes every entry and turns the cache into a permanent miss.
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::Release);
        self.clear();
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Current cache generation.
    pub fn generation(&self) -> u64 {
        self.shared.generation()
    }

    /// Starts a new generation, returning it.
    ///
    /// Called when the server reports changes: every item stored before the
    /// bump reports [`ReleaseHandle::might_have_been_modified`] until it is
    /// confirmed again.
    pub fn bump_generation(&self) -> u64 {
        self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Maximum number of entries; `u64::MAX` for a cache bounded by bytes.
    pub fn max_entries(&self) -> u64 {
        self.max_entries
    }

    /// Number of live entries, after applying pending evictions.
    pub fn entry_count(&self) -> u64 {
        self.items.run_pending_tasks();
        self.items.entry_count()
    }

    /// Whether an entry exists for `key`, without counting as use.
    pub fn contains(&self, key: &CacheKey) -> bool {
        !self.is_disposed() && self.items.contains_key(key)
    }

    /// Applies pending maintenance (evictions, recency updates).
    ///
    /// Maintenance also runs on its own; calling this makes the state
    /// observable deterministically.
    pub fn sync(&self) {
        self.items.run_pending_tasks();
    }
}
