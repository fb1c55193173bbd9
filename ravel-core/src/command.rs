//! The command contract.
//!
//! A command is a declarative description of one server operation: it
//! builds an [`HttpRequest`] for a node, declares the [`ResponseShape`] it
//! expects and whether the response may be cached, and consumes the body.
//! The executor depends only on this trait, never on concrete command types.
//!
//! ## Lifecycle
//!
//! For every invocation the executor calls, in order:
//!
//! 1. [`Command::create_request`], once
//! 2. [`Command::serve_locally`], only when aggressive caching is active
//! 3. one of [`Command::set_response`] (`Object`) or [`Command::set_response_raw`] (`Raw`),
//!    unless the shape is `Empty` or the server sent no content
//!
//! Commands keep their result in a [`ResultSlot`], which guarantees it is
//! filled at most once per invocation.

use std::time::Duration;

use async_trait::async_trait;

use crate::body::BodyStream;
use crate::error::CommandError;
use crate::node::ServerNode;
use crate::policy::{AggressiveCacheOptions, NotFoundPolicy};
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Declared shape of a command's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// No body is expected; the result stays absent.
    Empty,
    /// A JSON body parsed through a response pipeline. The only cacheable shape.
    Object,
    /// The body stream is handed to the command untouched.
    Raw,
}

/// Who releases the body stream once the executor is done with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyDisposal {
    /// The executor drained or dropped the stream before returning.
    #[default]
    Automatic,
    /// Ownership moved to the command, which must drain or drop it.
    Manually,
}

/// A single server operation.
#[async_trait]
pub trait Command: Send {
    /// Typed result produced by the command.
    type Output: Send;

    /// Command name used in errors and logs.
    fn name(&self) -> &str;

    /// Builds the request for `node`.
    fn create_request(&mut self, node: &ServerNode) -> Result<HttpRequest, CommandError>;

    /// Declared response shape.
    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Object
    }

    /// Whether the command only reads state.
    fn is_read_request(&self) -> bool;

    /// Whether responses may be stored in and revalidated against the cache.
    fn can_cache(&self) -> bool {
        true
    }

    /// Whether cached responses may be served without asking the server.
    fn can_cache_aggressively(&self) -> bool {
        true
    }

    /// Meaning of a 404 for this command.
    fn not_found_policy(&self) -> NotFoundPolicy {
        if self.is_read_request() {
            NotFoundPolicy::CacheAbsent
        } else {
            NotFoundPolicy::Fail
        }
    }

    /// Advisory timeout forwarded to the transport.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Tells a command that manages its own cache entries whether this
    /// invocation may read and write the cache. Called before
    /// [`create_request`](Self::create_request).
    fn use_cache(&mut self, _enabled: bool) {}

    /// Lets a command that manages its own cache entries answer without the network.
    ///
    /// Returning `Ok(true)` means the result is filled and no request is sent.
    fn serve_locally(&mut self, _options: &AggressiveCacheOptions) -> Result<bool, CommandError> {
        Ok(false)
    }

    /// Consumes an `Object` body.
    ///
    /// `None` means the response carried no body (404 or zero length) and the
    /// result is absent. `from_cache` is `true` when the body replays a cached
    /// payload. Returns the raw body text to cache, if the command collected it.
    async fn set_response(
        &mut self,
        body: Option<BodyStream>,
        from_cache: bool,
    ) -> Result<Option<String>, CommandError>;

    /// Takes ownership of a `Raw` response.
    async fn set_response_raw(&mut self, _response: HttpResponse) -> Result<(), CommandError> {
        Err(CommandError::UnsupportedShape(ResponseShape::Raw))
    }

    /// The result, if the command produced one.
    fn result(&self) -> Option<&Self::Output>;

    /// Moves the result out of the command.
    fn take_result(&mut self) -> Option<Self::Output>;
}

/// Holds a command result and enforces it is filled once.
///
/// ```
/// use ravel_core::ResultSlot;
///
/// let mut slot = ResultSlot::new();
/// assert!(!slot.is_filled());
/// slot.fill(Some(42)).unwrap();
/// assert_eq!(slot.get(), Some(&42));
/// assert!(slot.fill(Some(7)).is_err());
/// ```
#[derive(Debug)]
pub struct ResultSlot<T> {
    value: Option<T>,
    filled: bool,
}

impl<T> ResultSlot<T> {
    /// An empty slot.
    pub fn new() -> Self {
        Self {
            value: None,
            filled: false,
        }
    }

    /// Fills the slot. `None` records an absent result.
    pub fn fill(&mut self, value: Option<T>) -> Result<(), CommandError> {
        if self.filled {
            return Err(CommandError::ResultAlreadySet);
        }
        self.value = value;
        self.filled = true;
        Ok(())
    }

    /// Whether the lifecycle already filled the slot (possibly with an absent result).
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// The result, if present.
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Moves the result out.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }

    /// Empties the slot for a new invocation.
    pub fn reset(&mut self) {
        self.value = None;
        self.filled = false;
    }
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
