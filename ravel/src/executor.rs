//! The command lifecycle.
//!
//! [`CommandExecutor`] drives a [`Command`] through one invocation:
//!
//! 1. **Building**: the command produces its request for the node.
//! 2. **Aggressive caching**: when enabled, a fresh cached entry (or the
//!    command itself, through [`Command::serve_locally`]) answers without a
//!    round trip.
//! 3. **Conditional request**: a cached change vector is sent as
//!    `If-None-Match`.
//! 4. **Status handling**: 304 reuses the cached body, 404 follows the
//!    command's [`NotFoundPolicy`], 204 and empty bodies produce an absent
//!    result, other errors fail the command.
//! 5. **Parsing and caching**: `Object` bodies go through the command's
//!    pipeline and, when the command collected the raw text and the server
//!    sent a change vector, are written back to the cache.
//!
//! Transport errors are never retried here.

use http::StatusCode;
use ravel_cache::{ReleaseHandle, ResponseCache};
use ravel_core::{
    AggressiveCacheMode, AggressiveCacheOptions, BodyDisposal, CacheKey, Command, CommandError,
    HttpTransport, InvalidResponse, NotFoundPolicy, ResponseShape, ServerNode, body,
};
use tracing::{Instrument, Span, debug, field, info_span};

use crate::config::{ExecuteOptions, ExecutorConfig};
use crate::context::{CacheStatus, ExecutionContext, LifecycleState};
use crate::error::ExecutionError;
use crate::metrics::{record_context_metrics, record_failure};

/// Longest error body kept in [`CommandError::Server`].
const MAX_ERROR_MESSAGE: usize = 4096;

/// Runs commands against a transport while maintaining a response cache.
///
/// The cache is shared by every invocation on this executor and by clones of
/// [`cache`](Self::cache), such as the one a batch command holds.
#[derive(Debug, Clone)]
pub struct CommandExecutor<T> {
    transport: T,
    cache: ResponseCache,
    options: ExecuteOptions,
}

impl<T: HttpTransport> CommandExecutor<T> {
    /// Creates an executor with a default cache of 500 entries.
    pub fn new(transport: T) -> Self {
        Self::with_cache(transport, ResponseCache::default())
    }

    /// Creates an executor over an existing cache.
    pub fn with_cache(transport: T, cache: ResponseCache) -> Self {
        Self {
            transport,
            cache,
            options: ExecuteOptions::default(),
        }
    }

    /// Creates an executor from its serializable configuration.
    pub fn from_config(transport: T, config: &ExecutorConfig) -> Self {
        Self {
            transport,
            cache: ResponseCache::from_config(&config.cache),
            options: config.execute_options(),
        }
    }

    /// Replaces the default invocation options.
    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    /// Default invocation options.
    pub fn options(&self) -> &ExecuteOptions {
        &self.options
    }

    /// The response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Disposes the response cache; later invocations always hit the network.
    pub fn dispose(&self) {
        self.cache.dispose();
    }

    /// Runs `command` against `node` with the default options.
    pub async fn execute<C>(
        &self,
        node: &ServerNode,
        command: &mut C,
    ) -> Result<ExecutionContext, ExecutionError>
    where
        C: Command,
    {
        let options = self.options;
        self.execute_with(node, command, &options).await
    }

    /// Runs `command` against `node` with explicit options.
    ///
    /// On success the command holds its result; on failure no partial result
    /// is observable and the cache is left as it was, except for a 304
    /// refresh that happened before the failure.
    pub async fn execute_with<C>(
        &self,
        node: &ServerNode,
        command: &mut C,
        options: &ExecuteOptions,
    ) -> Result<ExecutionContext, ExecutionError>
    where
        C: Command,
    {
        let name = command.name().to_owned();
        let span = info_span!(
            "command",
            name = %name,
            method = field::Empty,
            url = field::Empty,
        );

        let outcome = self
            .run(node, command, options, span.clone())
            .instrument(span)
            .await;

        match outcome {
            Ok(ctx) => {
                record_context_metrics(&name, &ctx);
                Ok(ctx)
            }
            Err(source) => {
                debug!(command = %name, error = %source, "command failed");
                record_failure(&name);
                Err(ExecutionError::new(name, source))
            }
        }
    }

    async fn run<C>(
        &self,
        node: &ServerNode,
        command: &mut C,
        options: &ExecuteOptions,
        span: Span,
    ) -> Result<ExecutionContext, CommandError>
    where
        C: Command,
    {
        let mut ctx = ExecutionContext::default();

        ctx.enter(LifecycleState::Building);
        command.use_cache(options.use_cache);
        let mut request = command.create_request(node)?;
        if request.timeout.is_none() {
            request.timeout = command.timeout();
        }
        span.record("method", field::display(&request.method));
        span.record("url", request.url.as_str());

        let shape = command.response_shape();
        let aggressive = options
            .active_aggressive()
            .filter(|_| command.can_cache_aggressively());

        if let Some(aggressive) = aggressive.as_ref() {
            if command.serve_locally(aggressive)? {
                debug!("command answered locally");
                ctx.status = CacheStatus::AggressiveHit;
                ctx.enter(LifecycleState::ServedFromCache);
                ctx.enter(LifecycleState::Done);
                return Ok(ctx);
            }
        }

        let cacheable = options.use_cache
            && command.can_cache()
            && command.is_read_request()
            && shape == ResponseShape::Object;
        ctx.status = if cacheable {
            CacheStatus::Miss
        } else {
            CacheStatus::Bypass
        };

        let key = cacheable.then(|| CacheKey::from(&request));
        let handle = key.as_ref().map(|key| self.cache.get(key));
        ctx.cache_key = key.clone();

        if let (Some(aggressive), Some(handle)) = (aggressive.as_ref(), handle.as_ref()) {
            if is_fresh(handle, aggressive) {
                serve_cached(command, handle, &mut ctx).await?;
                return Ok(ctx);
            }
        }

        if let Some(change_vector) = handle
            .as_ref()
            .filter(|handle| !handle.is_not_found())
            .and_then(ReleaseHandle::change_vector)
        {
            debug!(change_vector, "sending conditional request");
            request.set_if_none_match(change_vector)?;
        }
        let conditional = request.is_conditional();

        ctx.enter(LifecycleState::AwaitingResponse);
        let response = self.transport.send(request).await?;
        let status = response.status;
        ctx.http_status = Some(status);
        debug!(%status, "response received");

        if status == StatusCode::NOT_MODIFIED {
            if let Err(error) = body::drain(response.body).await {
                debug!(%error, "failed to drain not-modified body");
            }
            let payload = handle
                .as_ref()
                .filter(|_| conditional)
                .and_then(|handle| handle.payload().map(|payload| (handle, payload.to_owned())));
            let Some((handle, payload)) = payload else {
                return Err(InvalidResponse::UnexpectedNotModified.into());
            };
            handle.not_modified();
            ctx.enter(LifecycleState::NotModified);
            command
                .set_response(Some(body::from_bytes(payload)), true)
                .await?;
            ctx.status = CacheStatus::NotModified;
        } else if status == StatusCode::NOT_FOUND {
            body::drain(response.body).await?;
            let policy = command.not_found_policy();
            debug!(?policy, "resource not found");
            if policy == NotFoundPolicy::Fail {
                return Err(CommandError::NotFound);
            }
            ctx.enter(LifecycleState::Empty);
            if policy == NotFoundPolicy::CacheAbsent {
                if let Some(key) = key.as_ref() {
                    self.cache.set_not_found(key, aggressive.is_some());
                    ctx.enter(LifecycleState::Cached);
                }
            }
            if shape == ResponseShape::Object {
                command.set_response(None, false).await?;
            }
        } else if !status.is_success() {
            let message = body::read_text(response.body, MAX_ERROR_MESSAGE).await?;
            return Err(CommandError::Server { status, message });
        } else if shape == ResponseShape::Empty || status == StatusCode::NO_CONTENT {
            body::drain(response.body).await?;
            ctx.enter(LifecycleState::Empty);
            if shape == ResponseShape::Object {
                command.set_response(None, false).await?;
            }
        } else if shape == ResponseShape::Raw {
            ctx.disposal = BodyDisposal::Manually;
            ctx.enter(LifecycleState::Parsing);
            command.set_response_raw(response).await?;
        } else if response.content_length() == Some(0) {
            body::drain(response.body).await?;
            ctx.enter(LifecycleState::Empty);
            command.set_response(None, false).await?;
        } else {
            let change_vector = response.change_vector();
            ctx.enter(LifecycleState::Parsing);
            let collected = command.set_response(Some(response.body), false).await?;
            match (key.as_ref(), change_vector, collected) {
                (Some(key), Some(change_vector), Some(payload)) => {
                    self.cache.set(key, &change_vector, &payload);
                    ctx.enter(LifecycleState::Cached);
                }
                (Some(_), None, _) => debug!("response carries no change vector, not cached"),
                (Some(_), Some(_), None) => debug!("command did not collect the body, not cached"),
                (None, ..) => {}
            }
        }

        ctx.enter(LifecycleState::Done);
        Ok(ctx)
    }
}

/// Whether `handle` may be served without asking the server.
pub(crate) fn is_fresh(handle: &ReleaseHandle, options: &AggressiveCacheOptions) -> bool {
    !handle.is_empty()
        && handle.age() < options.duration
        && (options.mode == AggressiveCacheMode::DoNotTrackChanges
            || !handle.might_have_been_modified())
}

async fn serve_cached<C>(
    command: &mut C,
    handle: &ReleaseHandle,
    ctx: &mut ExecutionContext,
) -> Result<(), CommandError>
where
    C: Command,
{
    ctx.enter(LifecycleState::ServedFromCache);
    match handle.payload() {
        Some(payload) => {
            debug!("serving aggressively cached response");
            command
                .set_response(Some(body::from_bytes(payload.to_owned())), true)
                .await?;
            ctx.status = CacheStatus::AggressiveHit;
        }
        None => {
            debug!("serving aggressively cached not-found marker");
            command.set_response(None, true).await?;
            ctx.status = CacheStatus::NotFoundCached;
        }
    }
    ctx.enter(LifecycleState::Done);
    Ok(())
}
