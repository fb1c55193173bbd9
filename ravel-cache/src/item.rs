//! Cached entries and the read-side handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;

use crate::cache::Shared;

/// Markers attached to a cached entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFlags {
    /// The entry records a confirmed 404 rather than a body.
    pub not_found: bool,
    /// The entry was written while serving aggressively cached requests.
    pub aggressively_cached: bool,
}

impl ItemFlags {
    /// No markers.
    pub const NONE: ItemFlags = ItemFlags {
        not_found: false,
        aggressively_cached: false,
    };
}

/// A cached response: change vector, raw body and freshness bookkeeping.
///
/// Items are replaced as a whole on every write; the only in-place update is
/// the refresh performed by [`ReleaseHandle::not_modified`].
#[derive(Debug)]
pub struct CachedItem {
    change_vector: String,
    payload: Option<Arc<str>>,
    flags: ItemFlags,
    /// Milliseconds since the epoch of the last time the server confirmed this item.
    last_server_update: AtomicI64,
    generation: AtomicU64,
}

impl CachedItem {
    pub(crate) fn new(
        change_vector: String,
        payload: Option<Arc<str>>,
        flags: ItemFlags,
        generation: u64,
    ) -> Self {
        Self {
            change_vector,
            payload,
            flags,
            last_server_update: AtomicI64::new(Utc::now().timestamp_millis()),
            generation: AtomicU64::new(generation),
        }
    }

    /// Server-assigned version token.
    pub fn change_vector(&self) -> &str {
        &self.change_vector
    }

    /// Raw response body; `None` for not-found markers.
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Entry markers.
    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    /// Cache generation the item was stored or last confirmed in.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Time elapsed since the server last confirmed the item.
    pub fn age(&self) -> Duration {
        let elapsed = Utc::now().timestamp_millis() - self.last_server_update.load(Ordering::Acquire);
        Duration::from_millis(elapsed.max(0) as u64)
    }

    /// Estimated memory footprint in bytes.
    pub(crate) fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.change_vector.len()
            + self.payload.as_ref().map_or(0, |p| p.len())
    }

    fn touch(&self, generation: u64) {
        self.last_server_update
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        self.generation.store(generation, Ordering::Release);
    }
}

/// Owned copy of what a lookup found: `{None, None}` for a miss.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedInfo {
    /// Change vector of the entry.
    pub change_vector: Option<String>,
    /// Raw body of the entry.
    pub payload: Option<String>,
}

/// Short-lived view of a cache lookup.
///
/// A handle holds the item found for a key, or nothing. Marking it
/// [`not_modified`](Self::not_modified) is the only mutation the read side may
/// perform on the cache.
#[derive(Debug)]
pub struct ReleaseHandle {
    item: Option<Arc<CachedItem>>,
    cache_generation: u64,
    shared: Arc<Shared>,
}

impl ReleaseHandle {
    pub(crate) fn new(item: Option<Arc<CachedItem>>, shared: Arc<Shared>) -> Self {
        let cache_generation = shared.generation();
        Self {
            item,
            cache_generation,
            shared,
        }
    }

    /// The item found by the lookup.
    pub fn item(&self) -> Option<&CachedItem> {
        self.item.as_deref()
    }

    /// Returns `true` when the lookup missed.
    pub fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    /// Change vector of the held item.
    pub fn change_vector(&self) -> Option<&str> {
        self.item.as_deref().map(CachedItem::change_vector)
    }

    /// Raw body of the held item.
    pub fn payload(&self) -> Option<&str> {
        self.item.as_deref().and_then(CachedItem::payload)
    }

    /// Whether the held item is a negative-cache marker.
    pub fn is_not_found(&self) -> bool {
        self.item.as_deref().is_some_and(|item| item.flags().not_found)
    }

    /// Owned copy of change vector and payload.
    pub fn info(&self) -> CachedInfo {
        CachedInfo {
            change_vector: self.change_vector().map(str::to_owned),
            payload: self.payload().map(str::to_owned),
        }
    }

    /// Time since the server last confirmed the item, or [`Duration::MAX`]
    /// when the handle holds nothing.
    pub fn age(&self) -> Duration {
        self.item.as_deref().map_or(Duration::MAX, CachedItem::age)
    }

    /// Whether a generation bump happened after the item was last confirmed.
    ///
    /// An empty handle always reports `true`.
    pub fn might_have_been_modified(&self) -> bool {
        self.item
            .as_deref()
            .is_none_or(|item| item.generation() != self.shared.generation())
    }

    /// Records that the server answered 304 for this item.
    ///
    /// Refreshes the age and re-stamps the generation observed when the
    /// handle was taken. No-op for an empty handle.
    pub fn not_modified(&self) {
        if let Some(item) = self.item.as_deref() {
            item.touch(self.cache_generation);
        }
    }
}
