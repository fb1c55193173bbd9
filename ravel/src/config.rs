//! Executor configuration.
//!
//! [`ExecutorConfig`] is the serializable form, suitable for YAML files:
//!
//! ```yaml
//! cache:
//!   max_entries: 1000
//! aggressive_caching:
//!   duration: 30s
//!   mode: DoNotTrackChanges
//! use_cache: true
//! ```
//!
//! [`ExecuteOptions`] is the per-invocation form derived from it.

use std::time::Duration;

use ravel_cache::ResponseCacheConfig;
use ravel_core::{AggressiveCacheMode, AggressiveCacheOptions};
use serde::{Deserialize, Serialize};

/// Serializable executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Response cache sizing.
    #[serde(default)]
    pub cache: ResponseCacheConfig,
    /// Default aggressive caching, off when absent.
    #[serde(default)]
    pub aggressive_caching: Option<AggressiveCacheOptions>,
    /// Whether commands consult and populate the response cache at all.
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cache: ResponseCacheConfig::default(),
            aggressive_caching: None,
            use_cache: true,
        }
    }
}

impl ExecutorConfig {
    /// Invocation options implied by this configuration.
    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            use_cache: self.use_cache,
            aggressive: self.aggressive_caching,
        }
    }
}

/// Caching behaviour of one command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Consult and populate the response cache.
    pub use_cache: bool,
    /// Serve fresh cached entries without a round trip.
    pub aggressive: Option<AggressiveCacheOptions>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            aggressive: None,
        }
    }
}

impl ExecuteOptions {
    /// Options that bypass the cache entirely.
    pub fn no_cache() -> Self {
        Self {
            use_cache: false,
            aggressive: None,
        }
    }

    /// Enables aggressive caching for entries younger than `duration`.
    pub fn aggressively_cache_for(mut self, duration: Duration) -> Self {
        self.aggressive = Some(AggressiveCacheOptions::new(duration));
        self
    }

    /// Enables aggressive caching with explicit options.
    pub fn aggressive(mut self, options: AggressiveCacheOptions) -> Self {
        self.aggressive = Some(options);
        self
    }

    /// Replaces the change-tracking mode of the aggressive options, if enabled.
    pub fn tracking(mut self, mode: AggressiveCacheMode) -> Self {
        self.aggressive = self.aggressive.map(|options| options.mode(mode));
        self
    }

    /// Aggressive options, unless the cache is disabled.
    pub(crate) fn active_aggressive(&self) -> Option<AggressiveCacheOptions> {
        self.aggressive.filter(|_| self.use_cache)
    }
}
