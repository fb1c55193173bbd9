//! # ravel-cache
//!
//! In-memory response cache keyed by [`CacheKey`], storing the change vector
//! and raw body of the last successful fetch of each resource.
//!
//! ```
//! use ravel_cache::ResponseCache;
//! use ravel_core::CacheKey;
//!
//! let cache = ResponseCache::builder().max_entries(100).build();
//! let key = CacheKey::from_raw("GET http://node/databases/db/docs?id=users/1");
//!
//! cache.set(&key, "A:1-abc", r#"{"Results":[]}"#);
//! let handle = cache.get(&key);
//! assert_eq!(handle.change_vector(), Some("A:1-abc"));
//! assert_eq!(handle.payload(), Some(r#"{"Results":[]}"#));
//! ```
#![warn(missing_docs)]

mod builder;
mod cache;
mod config;
mod item;

pub use builder::ResponseCacheBuilder;
pub use cache::{DEFAULT_MAX_ENTRIES, NOT_FOUND_CHANGE_VECTOR, ResponseCache};
pub use config::ResponseCacheConfig;
pub use item::{CachedInfo, CachedItem, ItemFlags, ReleaseHandle};
pub use ravel_core::CacheKey;
