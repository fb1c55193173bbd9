#![warn(missing_docs)]
//! # ravel
//!
//! Command execution for document-database clients.
//!
//! A [`Command`] describes one server operation. The [`CommandExecutor`]
//! runs it: builds the request, consults the [`ResponseCache`] for a change
//! vector to send as `If-None-Match`, interprets the status (200, 204, 304,
//! 404, errors), routes the body through the command's response pipeline and
//! writes fresh responses back to the cache.
//!
//! ## Features
//!
//! - **Conditional requests**: a 304 reuses the cached body and refreshes its age
//! - **Aggressive caching**: fresh entries are served without a round trip
//! - **Negative caching**: confirmed 404s are remembered per [`NotFoundPolicy`]
//! - **Batching**: [`BatchCommand`] fans one `multi_get` call out into
//!   independently cached sub-responses
//! - **Observability**: a `tracing` span per invocation, optional `metrics`
//!
//! ## Example
//!
//! ```rust,ignore
//! use ravel::{CommandExecutor, JsonCommand};
//! use ravel_core::{Command, ServerNode};
//! use ravel_pipeline::{KeyCaseProfile, PipelineBuilder};
//!
//! let executor = CommandExecutor::new(transport);
//! let node = ServerNode::new("http://localhost:8080", "northwind");
//!
//! let pipeline = PipelineBuilder::new()
//!     .parse_json()
//!     .key_case(KeyCaseProfile::DocumentLoad)
//!     .collect_body()
//!     .build();
//! let mut command = JsonCommand::get("get_document", "/docs?id=users/1", pipeline);
//!
//! let ctx = executor.execute(&node, &mut command).await?;
//! println!("{}: {:?}", ctx.status, command.take_result());
//! ```
//!
//! ## Cargo features
//!
//! - `metrics`: record counters through the `metrics` facade

pub mod batch;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod metrics;

pub use batch::{BatchCommand, SubRequest, SubResponse};
pub use commands::{JsonCommand, RawCommand, VoidCommand};
pub use config::{ExecuteOptions, ExecutorConfig};
pub use context::{CacheStatus, ExecutionContext, LifecycleState};
pub use error::ExecutionError;
pub use executor::CommandExecutor;

pub use ravel_cache::{ResponseCache, ResponseCacheConfig};
pub use ravel_core::{
    AggressiveCacheMode, AggressiveCacheOptions, Command, CommandError, NotFoundPolicy,
    ResponseShape, ServerNode,
};
