//! Serializable cache configuration.

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_MAX_ENTRIES;

/// Configuration of a [`ResponseCache`](crate::ResponseCache).
///
/// ```yaml
/// max_entries: 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCacheConfig {
    /// Maximum number of cached responses.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

fn default_max_entries() -> u64 {
    DEFAULT_MAX_ENTRIES
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}
