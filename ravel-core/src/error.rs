//! Error types for command execution.
//!
//! - [`TransportError`] - The connection or body stream failed
//! - [`InvalidResponse`] - A body arrived but does not match what the command declared
//! - [`CommandError`] - Everything a single command invocation can fail with
//!
//! A cache miss is never an error: it always degrades to a network fetch.

use http::StatusCode;
use thiserror::Error;

use crate::command::ResponseShape;

/// Connection or stream failure while talking to a node.
///
/// Not retried by ravel; failover belongs to the topology collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection broke.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),

    /// The body stream was closed or aborted before it ended.
    #[error("body stream aborted: {0}")]
    Aborted(String),
}

impl TransportError {
    /// Wraps any connection-level error.
    pub fn connection<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TransportError::Connection(Box::new(error))
    }

    /// An aborted stream with a human-readable reason.
    pub fn aborted(reason: impl Into<String>) -> Self {
        TransportError::Aborted(reason.into())
    }
}

/// A body that does not match the declared response expectations.
#[derive(Debug, Error)]
pub enum InvalidResponse {
    /// The body could not be parsed or transformed.
    #[error(transparent)]
    Body(Box<dyn std::error::Error + Send + Sync>),

    /// A field the command requires is absent.
    #[error("missing required field `{0}`")]
    MissingField(String),

    /// The body parsed but has the wrong shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A batched response does not line up with the submitted sub-requests.
    #[error("batch returned {actual} results for {expected} requests")]
    Misaligned {
        /// Number of submitted sub-requests.
        expected: usize,
        /// Number of returned sub-responses.
        actual: usize,
    },

    /// The server answered 304 although no cached entry backs the request.
    #[error("received 304 Not Modified without a cached entry")]
    UnexpectedNotModified,
}

/// Failure of one command invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Body present but unusable. Fatal, nothing is cached.
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] InvalidResponse),

    /// Connection or stream failure. Fatal, the partial body is discarded.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with an error status.
    #[error("server responded {status}: {message}")]
    Server {
        /// Response status.
        status: StatusCode,
        /// Body text, truncated.
        message: String,
    },

    /// The server answered 404 and the command treats that as failure.
    #[error("resource not found")]
    NotFound,

    /// The command could not build its request.
    #[error("failed to build request: {0}")]
    Request(String),

    /// The command result was already filled for this invocation.
    #[error("command result was already set")]
    ResultAlreadySet,

    /// The command does not handle this response shape.
    #[error("{0:?} responses are not supported by this command")]
    UnsupportedShape(ResponseShape),
}

impl CommandError {
    /// Returns `true` for failures caused by the response body or its alignment.
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, CommandError::InvalidResponse(_))
    }

    /// Returns `true` for connection and stream failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, CommandError::Transport(_))
    }
}
