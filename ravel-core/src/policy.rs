//! Caching and not-found policies declared by commands and callers.
//!
//! - [`AggressiveCacheOptions`] - Skip the network entirely for recently confirmed entries
//! - [`AggressiveCacheMode`] - Whether change notifications may invalidate such entries
//! - [`NotFoundPolicy`] - What a 404 means for a given command

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How aggressively cached entries react to change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggressiveCacheMode {
    /// Entries stored before the latest cache generation bump
    /// (see `ResponseCache::bump_generation`) are not served aggressively.
    #[default]
    TrackChanges,
    /// Only the entry age is considered.
    DoNotTrackChanges,
}

/// Options for serving cached responses without a network round trip.
///
/// When active for an invocation, a cached entry younger than `duration` is
/// returned as-is, provided the command allows aggressive caching.
///
/// ```
/// use ravel_core::{AggressiveCacheMode, AggressiveCacheOptions};
/// use std::time::Duration;
///
/// let options = AggressiveCacheOptions::new(Duration::from_secs(30));
/// assert_eq!(options.mode, AggressiveCacheMode::TrackChanges);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggressiveCacheOptions {
    /// Maximum age of an entry that may be served without asking the server.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Change-tracking mode.
    #[serde(default)]
    pub mode: AggressiveCacheMode,
}

impl AggressiveCacheOptions {
    /// Options with the given duration and [`AggressiveCacheMode::TrackChanges`].
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            mode: AggressiveCacheMode::default(),
        }
    }

    /// Replaces the change-tracking mode.
    pub fn mode(mut self, mode: AggressiveCacheMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What an HTTP 404 means for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Absent result; a negative-cache marker is stored when the command can cache.
    ///
    /// Default for read requests (lookups by id).
    CacheAbsent,
    /// Absent result, the cache is left alone.
    Absent,
    /// The invocation fails with `CommandError::NotFound`.
    ///
    /// Default for mutations.
    Fail,
}
