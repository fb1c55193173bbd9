//! Executor error type.

use ravel_core::CommandError;
use thiserror::Error;

/// A failed command invocation.
///
/// Carries the name of the command and the underlying cause. No partial
/// result is ever returned alongside it.
#[derive(Debug, Error)]
#[error("command `{command}` failed: {source}")]
pub struct ExecutionError {
    /// Name of the failed command.
    pub command: String,
    /// Why it failed.
    pub source: CommandError,
}

impl ExecutionError {
    /// Wraps `source` for the command named `command`.
    pub fn new(command: impl Into<String>, source: CommandError) -> Self {
        Self {
            command: command.into(),
            source,
        }
    }

    /// Returns `true` when the body did not match the command's expectations.
    pub fn is_invalid_response(&self) -> bool {
        self.source.is_invalid_response()
    }

    /// Returns `true` for connection and stream failures.
    pub fn is_transport(&self) -> bool {
        self.source.is_transport()
    }
}
