//! Cache key type.
//!
//! A [`CacheKey`] identifies a cacheable server resource. It is derived from
//! the HTTP method and the fully resolved URL (query string included) and
//! nothing else: per-call headers such as `If-None-Match` never take part in
//! the key, so two requests with the same key always address the same
//! resource.
//!
//! ## Format
//!
//! `{METHOD} {url}`
//!
//! ```
//! use http::Method;
//! use ravel_core::CacheKey;
//!
//! let key = CacheKey::new(&Method::GET, "http://127.0.0.1:8080/databases/db/docs?id=users/1");
//! assert_eq!(key.as_str(), "GET http://127.0.0.1:8080/databases/db/docs?id=users/1");
//! ```
//!
//! ## Performance
//!
//! The key wraps a [`SmolStr`], so cloning is O(1). Short keys are stored
//! inline and long keys share one reference-counted allocation.

use std::fmt;

use http::Method;
use smol_str::SmolStr;

use crate::request::HttpRequest;

/// A cache key identifying one cacheable resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Derives the key for `method` on the resolved `url`.
    pub fn new(method: &Method, url: &str) -> Self {
        CacheKey(SmolStr::from(format!("{} {}", method.as_str(), url)))
    }

    /// Wraps an already formatted key.
    ///
    /// Mostly useful for tests and tooling that inspect cache contents.
    pub fn from_raw(raw: impl Into<SmolStr>) -> Self {
        CacheKey(raw.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the estimated heap footprint of this key in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.len().saturating_sub(23)
    }
}

impl From<&HttpRequest> for CacheKey {
    fn from(request: &HttpRequest) -> Self {
        CacheKey::new(&request.method, &request.url)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
