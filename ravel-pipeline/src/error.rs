//! Pipeline error type.

use ravel_core::{CommandError, InvalidResponse, TransportError};
use thiserror::Error;

/// Failure while running a response pipeline.
///
/// Every variant except [`Stream`](PipelineError::Stream) describes a body
/// that does not match what the command declared, and surfaces as
/// [`InvalidResponse`] once converted into a [`CommandError`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The incremental tokenizer rejected the input.
    #[error("invalid JSON at byte {offset}: {reason}")]
    Syntax {
        /// Byte offset of the offending input.
        offset: usize,
        /// What was wrong.
        reason: &'static str,
    },

    /// Whole-document parsing or typed deserialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A string or captured body is not valid UTF-8.
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The body stream failed.
    #[error(transparent)]
    Stream(#[from] TransportError),

    /// A stage rejected an item.
    #[error("{0}")]
    Stage(String),

    /// The body ended before any JSON value.
    #[error("response body is empty")]
    Empty,

    /// The pipeline was dropped before it published a result.
    #[error("pipeline closed before producing a result")]
    Closed,
}

impl PipelineError {
    pub(crate) fn syntax(offset: usize, reason: &'static str) -> Self {
        PipelineError::Syntax { offset, reason }
    }
}

impl From<PipelineError> for CommandError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Stream(transport) => CommandError::Transport(transport),
            other => CommandError::InvalidResponse(InvalidResponse::Body(Box::new(other))),
        }
    }
}
