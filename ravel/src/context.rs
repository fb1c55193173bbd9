//! Per-invocation execution record.

use std::fmt;

use http::StatusCode;
use ravel_core::{BodyDisposal, CacheKey};

/// How the cache took part in an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    /// The response came from the network and no cached entry was reused.
    #[default]
    Miss,
    /// The server answered 304 and the cached payload was reused.
    NotModified,
    /// A cached entry was served without contacting the server.
    AggressiveHit,
    /// A cached not-found marker was served without contacting the server.
    NotFoundCached,
    /// The invocation was not eligible for caching.
    Bypass,
}

impl CacheStatus {
    /// Returns the status as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Miss => "miss",
            CacheStatus::NotModified => "not_modified",
            CacheStatus::AggressiveHit => "aggressive_hit",
            CacheStatus::NotFoundCached => "not_found_cached",
            CacheStatus::Bypass => "bypass",
        }
    }

    /// Whether the result was produced from cached data.
    pub fn is_from_cache(&self) -> bool {
        matches!(
            self,
            CacheStatus::NotModified | CacheStatus::AggressiveHit | CacheStatus::NotFoundCached
        )
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the command lifecycle.
///
/// ```text
/// Building ─┬─▶ ServedFromCache ───────────────────────────┐
///           └─▶ AwaitingResponse ─┬─▶ NotModified ─────────┤
///                                 ├─▶ Empty ──▶ [Cached] ──┼─▶ Done
///                                 └─▶ Parsing ─▶ [Cached] ─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// The command is producing its request.
    Building,
    /// Answered from cache, no request sent.
    ServedFromCache,
    /// The request is in flight.
    AwaitingResponse,
    /// The server confirmed the cached entry.
    NotModified,
    /// No content: declared `Empty`, 204, zero length, or a tolerated 404.
    Empty,
    /// The body is being consumed by the command.
    Parsing,
    /// The cache was updated.
    Cached,
    /// Terminal state.
    Done,
}

/// Record of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionContext {
    /// Cache participation.
    pub status: CacheStatus,
    /// Lifecycle states visited, in order.
    pub states: Vec<LifecycleState>,
    /// Status of the HTTP response, when a request was sent.
    pub http_status: Option<StatusCode>,
    /// Who releases the body stream.
    pub disposal: BodyDisposal,
    /// Cache key of the request, when it was eligible for caching.
    pub cache_key: Option<CacheKey>,
}

impl ExecutionContext {
    pub(crate) fn enter(&mut self, state: LifecycleState) {
        tracing::debug!(?state, "command lifecycle");
        self.states.push(state);
    }

    /// Whether the lifecycle passed through `state`.
    pub fn visited(&self, state: LifecycleState) -> bool {
        self.states.contains(&state)
    }

    /// Whether a request was sent to the server.
    pub fn hit_network(&self) -> bool {
        self.visited(LifecycleState::AwaitingResponse)
    }
}
