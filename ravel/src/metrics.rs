//! Metrics declaration and recording.

use crate::context::ExecutionContext;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Cache participation

    /// Track number of 304 responses answered from the cache.
    pub static ref NOT_MODIFIED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "ravel_not_modified_total",
            "Total number of 304 responses answered from the cache."
        );
        "ravel_not_modified_total"
    };
    /// Track number of invocations served without a round trip.
    pub static ref AGGRESSIVE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "ravel_aggressive_hit_total",
            "Total number of invocations served from the cache without a round trip."
        );
        "ravel_aggressive_hit_total"
    };
    /// Track number of cacheable invocations fetched from the server.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "ravel_cache_miss_total",
            "Total number of cacheable invocations fetched from the server."
        );
        "ravel_cache_miss_total"
    };

    // Cache writes

    /// Track number of responses stored in the cache.
    pub static ref CACHE_WRITE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "ravel_cache_write_total",
            "Total number of responses stored in the cache."
        );
        "ravel_cache_write_total"
    };
    /// Track number of not-found markers stored in the cache.
    pub static ref NOT_FOUND_WRITE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "ravel_not_found_write_total",
            "Total number of not-found markers stored in the cache."
        );
        "ravel_not_found_write_total"
    };

    // Failures

    /// Track number of failed command invocations.
    pub static ref COMMAND_FAILED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "ravel_command_failed_total",
            "Total number of failed command invocations."
        );
        "ravel_command_failed_total"
    };
}

/// Records metrics for a finished invocation of `command`.
///
/// When the `metrics` feature is disabled this is a no-op.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_context_metrics(command: &str, ctx: &ExecutionContext) {
    use crate::context::{CacheStatus, LifecycleState};

    let counter = match ctx.status {
        CacheStatus::NotModified => Some(*NOT_MODIFIED_COUNTER),
        CacheStatus::AggressiveHit | CacheStatus::NotFoundCached => Some(*AGGRESSIVE_HIT_COUNTER),
        CacheStatus::Miss => Some(*CACHE_MISS_COUNTER),
        CacheStatus::Bypass => None,
    };
    if let Some(counter) = counter {
        metrics::counter!(counter, "command" => command.to_string()).increment(1);
    }

    if ctx.visited(LifecycleState::Cached) {
        let counter = if ctx.http_status == Some(http::StatusCode::NOT_FOUND) {
            *NOT_FOUND_WRITE_COUNTER
        } else {
            *CACHE_WRITE_COUNTER
        };
        metrics::counter!(counter, "command" => command.to_string()).increment(1);
    }
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_context_metrics(_command: &str, _ctx: &ExecutionContext) {}

/// Records a failed invocation of `command`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_failure(command: &str) {
    metrics::counter!(*COMMAND_FAILED_COUNTER, "command" => command.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_failure(_command: &str) {}
